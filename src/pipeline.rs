use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};
use tokio::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::AppConfig;
use crate::extractors::{ExtractionError, SalesExtractor, TerminalExtractor};
use crate::models::{CycleScope, MonitorState, SaleRecord, TerminalProblem};
use crate::notifier::{
    format_problems, format_sales, DeliveryReport, NotificationDispatcher, TelegramNotifier,
};
use crate::session::{
    AuthOutcome, ChromeSessionFactory, Credentials, DashboardSession, SessionError,
    SessionFactory,
};
use crate::store::{diff, ChangeStore, StoreError};
use crate::utils::error::AppError;

#[derive(Error, Debug)]
pub enum CycleError {
    #[error("A monitoring cycle is already running")]
    Busy,

    #[error("Browser session failed: {0}")]
    Session(#[from] SessionError),

    #[error("Extraction failed: {0}")]
    Extraction(#[from] ExtractionError),

    #[error("Failed to persist baseline: {0}")]
    Store(#[from] StoreError),

    #[error("Cycle exceeded its deadline of {0:?}")]
    DeadlineExceeded(Duration),

    #[error("Cycle task failed: {0}")]
    Task(String),
}

/// Stages of one cycle, in the order a successful cycle passes them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum CycleStage {
    Idle,
    SessionOpen,
    Authenticated,
    SalesExtracted,
    TerminalsExtracted,
    Diffed,
    Notified,
    Committed,
    Closed,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Trigger {
    Scheduled,
    OnDemand { caller: String },
}

impl std::fmt::Display for Trigger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Trigger::Scheduled => f.write_str("scheduled"),
            Trigger::OnDemand { caller } => write!(f, "on-demand by {}", caller),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CycleReport {
    pub cycle_id: Uuid,
    pub scope: CycleScope,
    pub trigger: Trigger,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub sales_scraped: Option<usize>,
    pub new_sales: Vec<SaleRecord>,
    pub problems_scraped: Option<usize>,
    pub new_problems: Vec<TerminalProblem>,
    pub delivery: DeliveryReport,
    pub stages: Vec<CycleStage>,
}

impl CycleReport {
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();
        if self.scope.includes_sales() {
            lines.push(match self.new_sales.len() {
                0 => "No new sales.".to_string(),
                n => format!("Found {} new sales.", n),
            });
        }
        if self.scope.includes_terminals() {
            lines.push(match self.new_problems.len() {
                0 => "No terminal problems detected.".to_string(),
                n => format!("Found {} terminal problems.", n),
            });
        }
        lines.join("\n")
    }
}

#[derive(Debug, Clone)]
pub enum CycleOutcome {
    Completed(CycleReport),
    AuthFailed,
}

/// Caller-facing classification of a cycle result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ExitStatus {
    Success,
    AuthFailure,
    FatalError,
}

impl ExitStatus {
    pub fn code(self) -> i32 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::FatalError => 1,
            ExitStatus::AuthFailure => 2,
        }
    }
}

/// Maps a cycle result to its exit status and user-facing message.
pub fn verdict(result: &Result<CycleOutcome, CycleError>) -> (ExitStatus, String) {
    match result {
        Ok(CycleOutcome::Completed(report)) => (ExitStatus::Success, report.summary()),
        Ok(CycleOutcome::AuthFailed) => (
            ExitStatus::AuthFailure,
            "Authorization failed: the dashboard did not accept the login.".to_string(),
        ),
        Err(CycleError::Busy) => (
            ExitStatus::FatalError,
            "A check is already running, try again later.".to_string(),
        ),
        Err(e) => (ExitStatus::FatalError, format!("Error: {}", e)),
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorStatus {
    pub started_at: DateTime<Utc>,
    pub cycles_run: u64,
    pub cycles_succeeded: u64,
    pub auth_failures: u64,
    pub cycles_failed: u64,
    pub rejected_triggers: u64,
    pub last_run: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_status: Option<ExitStatus>,
    pub last_message: Option<String>,
}

impl MonitorStatus {
    fn new() -> Self {
        Self {
            started_at: Utc::now(),
            cycles_run: 0,
            cycles_succeeded: 0,
            auth_failures: 0,
            cycles_failed: 0,
            rejected_triggers: 0,
            last_run: None,
            last_success: None,
            last_status: None,
            last_message: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub running: bool,
    pub uptime_seconds: u64,
    pub message: String,
    #[serde(flatten)]
    pub status: MonitorStatus,
}

/// Holds the cycle gate and marks the monitor as running until released.
struct CycleLease {
    _guard: OwnedMutexGuard<()>,
    running: Arc<AtomicBool>,
}

impl CycleLease {
    fn new(guard: OwnedMutexGuard<()>, running: Arc<AtomicBool>) -> Self {
        running.store(true, Ordering::SeqCst);
        Self {
            _guard: guard,
            running,
        }
    }
}

impl Drop for CycleLease {
    fn drop(&mut self) {
        self.running.store(false, Ordering::SeqCst);
    }
}

/// Closes the session when the cycle lets go of it, on every exit path.
struct SessionGuard(Box<dyn DashboardSession>);

impl Deref for SessionGuard {
    type Target = dyn DashboardSession;

    fn deref(&self) -> &Self::Target {
        self.0.as_ref()
    }
}

impl DerefMut for SessionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.0.as_mut()
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        self.0.close();
    }
}

enum ScrapeOutcome {
    AuthFailed,
    Scraped {
        sales: Option<Vec<SaleRecord>>,
        problems: Option<Vec<TerminalProblem>>,
        stages: Vec<CycleStage>,
    },
}

/// The browser half of a cycle. Runs on a blocking thread because the
/// browser driver is synchronous.
struct ScrapeJob {
    sessions: Arc<dyn SessionFactory>,
    credentials: Credentials,
    sales: Option<SalesExtractor>,
    terminals: Option<TerminalExtractor>,
}

impl ScrapeJob {
    fn run(self) -> Result<ScrapeOutcome, CycleError> {
        let mut stages = vec![CycleStage::Idle];

        let mut session = SessionGuard(self.sessions.open()?);
        enter(&mut stages, CycleStage::SessionOpen);

        match session.authenticate(&self.credentials)? {
            AuthOutcome::Success => enter(&mut stages, CycleStage::Authenticated),
            AuthOutcome::Timeout => {
                tracing::warn!("Login did not complete within the timeout");
                return Ok(ScrapeOutcome::AuthFailed);
            }
        }

        let sales = match &self.sales {
            Some(extractor) => {
                let sales = extractor.extract(&mut *session)?;
                enter(&mut stages, CycleStage::SalesExtracted);
                Some(sales)
            }
            None => None,
        };

        let problems = match &self.terminals {
            Some(extractor) => {
                let problems = extractor.extract(&mut *session)?;
                enter(&mut stages, CycleStage::TerminalsExtracted);
                Some(problems)
            }
            None => None,
        };

        drop(session);
        Ok(ScrapeOutcome::Scraped {
            sales,
            problems,
            stages,
        })
    }
}

fn enter(stages: &mut Vec<CycleStage>, stage: CycleStage) {
    tracing::debug!(stage = ?stage, "Cycle stage reached");
    stages.push(stage);
}

/// Runs monitoring cycles, at most one at a time.
pub struct Monitor {
    config: Arc<AppConfig>,
    sessions: Arc<dyn SessionFactory>,
    store: ChangeStore,
    dispatcher: NotificationDispatcher,
    gate: Arc<Mutex<()>>,
    running: Arc<AtomicBool>,
    status: RwLock<MonitorStatus>,
}

impl Monitor {
    pub fn new(
        config: Arc<AppConfig>,
        sessions: Arc<dyn SessionFactory>,
        dispatcher: NotificationDispatcher,
    ) -> Self {
        let store = ChangeStore::new(&config.storage.state_file);
        Self {
            config,
            sessions,
            store,
            dispatcher,
            gate: Arc::new(Mutex::new(())),
            running: Arc::new(AtomicBool::new(false)),
            status: RwLock::new(MonitorStatus::new()),
        }
    }

    /// Wires the headless Chrome session factory and the Telegram sink.
    pub fn from_config(config: Arc<AppConfig>) -> Result<Self, AppError> {
        let sessions = Arc::new(ChromeSessionFactory::new(config.scraper.clone()));
        let notifier = TelegramNotifier::new(config.notifications.telegram.clone())?;
        let dispatcher =
            NotificationDispatcher::new(Arc::new(notifier), config.notifications.recipients.clone());
        Ok(Self::new(config, sessions, dispatcher))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn store(&self) -> &ChangeStore {
        &self.store
    }

    /// Whether a cycle currently holds the browser.
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    pub async fn run_cycle(
        &self,
        scope: CycleScope,
        trigger: Trigger,
    ) -> Result<CycleOutcome, CycleError> {
        let lease = match self.gate.clone().try_lock_owned() {
            Ok(guard) => CycleLease::new(guard, Arc::clone(&self.running)),
            Err(_) => {
                tracing::info!(trigger = %trigger, "Cycle rejected, another cycle is running");
                self.status.write().await.rejected_triggers += 1;
                return Err(CycleError::Busy);
            }
        };

        let cycle_id = Uuid::new_v4();
        let span = tracing::info_span!("cycle", id = %cycle_id, scope = %scope);
        let result = self
            .execute(lease, cycle_id, scope, trigger)
            .instrument(span)
            .await;

        self.record(&result).await;
        result
    }

    async fn execute(
        &self,
        lease: CycleLease,
        cycle_id: Uuid,
        scope: CycleScope,
        trigger: Trigger,
    ) -> Result<CycleOutcome, CycleError> {
        let started_at = Utc::now();
        let timeout = Duration::from_secs(self.config.scheduler.cycle_timeout_secs);
        let deadline = Instant::now() + timeout;
        tracing::info!(trigger = %trigger, "Cycle started");

        let previous = self.store.load();

        let dashboard = &self.config.dashboard;
        let job = ScrapeJob {
            sessions: Arc::clone(&self.sessions),
            credentials: Credentials {
                login_url: dashboard.login_url.clone(),
                username: dashboard.username.clone(),
                password: dashboard.password.clone(),
            },
            sales: scope
                .includes_sales()
                .then(|| SalesExtractor::new(&dashboard.sales_url, &self.config.scraper)),
            terminals: scope
                .includes_terminals()
                .then(|| TerminalExtractor::new(&dashboard.terminals_url, &self.config.scraper)),
        };

        // The lease travels with the browser work so that a cycle abandoned
        // at the deadline still blocks new cycles until its browser is gone.
        let span = tracing::Span::current();
        let handle = tokio::task::spawn_blocking(move || {
            let _entered = span.enter();
            (job.run(), lease)
        });

        let (scraped, _lease) = match tokio::time::timeout_at(deadline, handle).await {
            Ok(Ok(pair)) => pair,
            Ok(Err(e)) => return Err(CycleError::Task(e.to_string())),
            Err(_) => {
                tracing::error!("Cycle deadline reached during scraping");
                return Err(CycleError::DeadlineExceeded(timeout));
            }
        };

        let (sales, problems, mut stages) = match scraped? {
            ScrapeOutcome::AuthFailed => return Ok(CycleOutcome::AuthFailed),
            ScrapeOutcome::Scraped {
                sales,
                problems,
                stages,
            } => (sales, problems, stages),
        };

        let new_sales = sales
            .as_deref()
            .map(|current| diff(&previous.last_sales, current))
            .unwrap_or_default();
        let new_problems = problems
            .as_deref()
            .map(|current| diff(&previous.last_problems, current))
            .unwrap_or_default();
        enter(&mut stages, CycleStage::Diffed);
        tracing::info!(
            new_sales = new_sales.len(),
            new_problems = new_problems.len(),
            "Diff computed"
        );

        let mut delivery = DeliveryReport::default();
        if !new_sales.is_empty() {
            delivery.merge(self.dispatcher.broadcast(&format_sales(&new_sales)).await);
        }
        if !new_problems.is_empty() {
            delivery.merge(self.dispatcher.broadcast(&format_problems(&new_problems)).await);
        }
        // A recipient who asked for a check always hears back, even when
        // there is nothing new.
        if let Trigger::OnDemand { caller } = &trigger {
            if self.dispatcher.is_recipient(caller) {
                if scope.includes_sales() && new_sales.is_empty() {
                    delivery.merge(self.dispatcher.send_to(caller, &format_sales(&[])).await);
                }
                if scope.includes_terminals() && new_problems.is_empty() {
                    delivery.merge(self.dispatcher.send_to(caller, &format_problems(&[])).await);
                }
            }
        }
        enter(&mut stages, CycleStage::Notified);

        // Once anything has been dispatched the baseline must advance, or the
        // next cycle would send the same records again.
        if Instant::now() >= deadline {
            tracing::warn!(
                timeout = ?timeout,
                "Cycle deadline passed during delivery, committing anyway"
            );
        }

        let sales_scraped = sales.as_ref().map(Vec::len);
        let problems_scraped = problems.as_ref().map(Vec::len);
        let next: MonitorState = previous.advance(sales, problems);
        self.store.commit(&next)?;
        enter(&mut stages, CycleStage::Committed);
        enter(&mut stages, CycleStage::Closed);

        Ok(CycleOutcome::Completed(CycleReport {
            cycle_id,
            scope,
            trigger,
            started_at,
            finished_at: Utc::now(),
            sales_scraped,
            new_sales,
            problems_scraped,
            new_problems,
            delivery,
            stages,
        }))
    }

    async fn record(&self, result: &Result<CycleOutcome, CycleError>) {
        let (exit_status, message) = verdict(result);
        let now = Utc::now();
        let mut status = self.status.write().await;

        status.cycles_run += 1;
        status.last_run = Some(now);
        status.last_status = Some(exit_status);
        status.last_message = Some(message.clone());

        match exit_status {
            ExitStatus::Success => {
                status.cycles_succeeded += 1;
                status.last_success = Some(now);
                tracing::info!(summary = %message, "Cycle completed");
            }
            ExitStatus::AuthFailure => {
                status.auth_failures += 1;
                tracing::warn!("Cycle aborted: authentication failed");
            }
            ExitStatus::FatalError => {
                status.cycles_failed += 1;
                tracing::error!("Cycle failed: {}", message);
            }
        }
    }

    /// Read-only health snapshot.
    pub async fn status(&self) -> StatusReport {
        let status = self.status.read().await.clone();
        let uptime = Utc::now().signed_duration_since(status.started_at);

        let message = match status.last_run {
            Some(last_run) => format!(
                "AliveWater monitoring is running.\nLast check: {}",
                last_run.format("%Y-%m-%d %H:%M:%S")
            ),
            None => "AliveWater monitoring is running.\nNo check has run yet.".to_string(),
        };

        StatusReport {
            running: self.is_running(),
            uptime_seconds: uptime.num_seconds().max(0) as u64,
            message,
            status,
        }
    }
}
