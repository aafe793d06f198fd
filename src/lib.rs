pub mod config;
pub mod extractors;
pub mod models;
pub mod notifier;
pub mod pipeline;
pub mod scheduler;
pub mod session;
pub mod store;
pub mod utils;
pub mod web;

// Re-export commonly used types
pub use config::AppConfig;
pub use models::{CycleScope, MonitorState, PaymentMethod, SaleRecord, TerminalProblem};
pub use pipeline::{CycleError, CycleOutcome, CycleReport, ExitStatus, Monitor, Trigger};
pub use scheduler::CycleScheduler;
pub use utils::error::AppError;

pub type Result<T> = std::result::Result<T, AppError>;
