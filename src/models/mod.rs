use serde::{Deserialize, Serialize};

pub mod sale;
pub mod state;
pub mod terminal;

// Re-exports for convenience
pub use sale::*;
pub use state::*;
pub use terminal::*;

/// Which dashboard views a cycle covers.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum CycleScope {
    #[default]
    All,
    Sales,
    Terminals,
}

impl CycleScope {
    pub fn includes_sales(self) -> bool {
        matches!(self, CycleScope::All | CycleScope::Sales)
    }

    pub fn includes_terminals(self) -> bool {
        matches!(self, CycleScope::All | CycleScope::Terminals)
    }
}

impl std::fmt::Display for CycleScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            CycleScope::All => "all",
            CycleScope::Sales => "sales",
            CycleScope::Terminals => "terminals",
        };
        f.write_str(name)
    }
}
