// Shared fixtures for the integration tests: a scripted dashboard standing in
// for the browser, a recording notification sink, and config/monitor helpers.

pub mod scheduler_tests;

use alivewater_monitor::{
    config::AppConfig,
    notifier::{MessageFormat, NotificationDispatcher, NotificationSink, NotifyError},
    session::{AuthOutcome, Credentials, DashboardSession, SessionError, SessionFactory},
    web::{create_router, AppState},
    Monitor,
};
use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Method, Request},
    Router,
};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const RECIPIENTS: [&str; 2] = ["1371753467", "867982256"];
pub const COIN_ICON: &str = "M512 64C264.6 64 64 264.6 64 512s200.6 448 448 448 448-200.6 448-448S759.4 64 512 64zm0 820c-205.4 0-372-166.6-372-372s166.6-372 372-372 372 166.6 372 372-166.6 372-372 372zm47.7-395.2l-25.4-5.9V348.6c38 5.2 61.5 29 65.5 58.2z";
pub const CARD_ICON: &str = "M928 160H96c-17.7 0-32 14.3-32 32v640c0 17.7 14.3 32 32 32h832c17.7 0 32-14.3 32-32V192c0-17.7-14.3-32-32-32zm-792 72h752v120H136V232z";

/// Test configuration pointing the state file into `dir`.
pub fn get_test_config(dir: &TempDir) -> AppConfig {
    let mut config = AppConfig::default();
    config.dashboard.username = "operator".to_string();
    config.dashboard.password = "secret".to_string();
    config.notifications.recipients = RECIPIENTS.iter().map(|id| id.to_string()).collect();
    config.notifications.telegram.bot_token = "123:abc".to_string();
    config.scheduler.run_on_start = false;
    config.scheduler.cycle_timeout_secs = 30;
    config.storage.state_file = dir.path().join("data.json").to_string_lossy().into_owned();
    config
}

/// Scripted page contents and behaviour for the fake dashboard.
#[derive(Debug, Clone)]
pub struct DashboardScript {
    pub pages: HashMap<String, String>,
    pub auth: AuthOutcome,
    pub launch_fails: bool,
    pub login_form_missing: bool,
    pub login_delay: Duration,
}

/// Session factory whose sessions serve pages from a script. Counts how many
/// sessions were opened and closed.
#[derive(Clone)]
pub struct FakeDashboard {
    script: Arc<Mutex<DashboardScript>>,
    pub opened: Arc<AtomicUsize>,
    pub closed: Arc<AtomicUsize>,
}

impl FakeDashboard {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(DashboardScript {
                pages: HashMap::new(),
                auth: AuthOutcome::Success,
                launch_fails: false,
                login_form_missing: false,
                login_delay: Duration::ZERO,
            })),
            opened: Arc::new(AtomicUsize::new(0)),
            closed: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn set_page(&self, url: &str, html: impl Into<String>) {
        self.script.lock().unwrap().pages.insert(url.to_string(), html.into());
    }

    pub fn remove_page(&self, url: &str) {
        self.script.lock().unwrap().pages.remove(url);
    }

    pub fn set_auth(&self, outcome: AuthOutcome) {
        self.script.lock().unwrap().auth = outcome;
    }

    pub fn fail_launch(&self) {
        self.script.lock().unwrap().launch_fails = true;
    }

    pub fn remove_login_form(&self) {
        self.script.lock().unwrap().login_form_missing = true;
    }

    pub fn slow_login(&self, delay: Duration) {
        self.script.lock().unwrap().login_delay = delay;
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl SessionFactory for FakeDashboard {
    fn open(&self) -> Result<Box<dyn DashboardSession>, SessionError> {
        let script = self.script.lock().unwrap().clone();
        if script.launch_fails {
            return Err(SessionError::Launch("browser binary not found".to_string()));
        }

        self.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            script,
            current: None,
            closed: Arc::clone(&self.closed),
            is_closed: false,
        }))
    }
}

struct FakeSession {
    script: DashboardScript,
    current: Option<String>,
    closed: Arc<AtomicUsize>,
    is_closed: bool,
}

impl DashboardSession for FakeSession {
    fn authenticate(&mut self, _credentials: &Credentials) -> Result<AuthOutcome, SessionError> {
        std::thread::sleep(self.script.login_delay);
        if self.script.login_form_missing {
            return Err(SessionError::MissingElement {
                selector: "input[name='login']".to_string(),
            });
        }
        Ok(self.script.auth)
    }

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        if !self.script.pages.contains_key(url) {
            return Err(SessionError::Navigation {
                url: url.to_string(),
                message: "net::ERR_NAME_NOT_RESOLVED".to_string(),
            });
        }
        self.current = Some(url.to_string());
        Ok(())
    }

    fn page_html(&self) -> Result<String, SessionError> {
        self.current
            .as_ref()
            .and_then(|url| self.script.pages.get(url))
            .cloned()
            .ok_or(SessionError::Closed)
    }

    fn close(&mut self) {
        if !self.is_closed {
            self.is_closed = true;
            self.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Sink that records every delivered message and fails for chosen recipients.
#[derive(Default)]
pub struct RecordingSink {
    sent: Mutex<Vec<(String, String)>>,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
}

impl RecordingSink {
    pub fn slow_delivery(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }

    pub fn fail_for(&self, recipient: &str) {
        self.failing.lock().unwrap().insert(recipient.to_string());
    }

    pub fn sent(&self) -> Vec<(String, String)> {
        self.sent.lock().unwrap().clone()
    }

    pub fn messages_for(&self, recipient: &str) -> Vec<String> {
        self.sent()
            .into_iter()
            .filter(|(to, _)| to == recipient)
            .map(|(_, text)| text)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    async fn send(
        &self,
        recipient: &str,
        text: &str,
        format: MessageFormat,
    ) -> Result<(), NotifyError> {
        assert_eq!(format, MessageFormat::Html);
        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(recipient) {
            return Err(NotifyError::Rejected {
                recipient: recipient.to_string(),
                status: 403,
                description: "Forbidden: bot was blocked by the user".to_string(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((recipient.to_string(), text.to_string()));
        Ok(())
    }
}

/// Everything a test needs to drive and inspect one monitor.
pub struct TestHarness {
    pub monitor: Arc<Monitor>,
    pub dashboard: FakeDashboard,
    pub sink: Arc<RecordingSink>,
    pub config: Arc<AppConfig>,
    pub dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_config(|_| {})
    }

    pub fn with_config(customize: impl FnOnce(&mut AppConfig)) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let mut config = get_test_config(&dir);
        customize(&mut config);
        let config = Arc::new(config);

        let dashboard = FakeDashboard::new();
        let sink = Arc::new(RecordingSink::default());
        let dispatcher = NotificationDispatcher::new(
            Arc::clone(&sink) as Arc<dyn NotificationSink>,
            config.notifications.recipients.clone(),
        );
        let monitor = Monitor::new(
            Arc::clone(&config),
            Arc::new(dashboard.clone()),
            dispatcher,
        );

        Self {
            monitor: Arc::new(monitor),
            dashboard,
            sink,
            config,
            dir,
        }
    }

    pub fn sales_url(&self) -> String {
        self.config.dashboard.sales_url.clone()
    }

    pub fn terminals_url(&self) -> String {
        self.config.dashboard.terminals_url.clone()
    }

    pub fn set_sales(&self, rows: &[SaleRow]) {
        self.dashboard.set_page(&self.sales_url(), sales_page(rows));
    }

    pub fn set_terminals(&self, terminals: &[(&str, &str, bool)]) {
        self.dashboard
            .set_page(&self.terminals_url(), terminals_page(terminals));
    }

    pub fn router(&self) -> Router {
        create_router(AppState {
            monitor: Arc::clone(&self.monitor),
            config: Arc::clone(&self.config),
        })
    }
}

/// One row of the sales fixture table.
pub struct SaleRow<'a> {
    pub number: &'a str,
    pub address: &'a str,
    pub time: &'a str,
    pub liters: &'a str,
    pub total: &'a str,
    pub icon: Option<&'a str>,
}

pub fn sale_row(number: &str) -> SaleRow<'_> {
    SaleRow {
        number,
        address: "Lenina 1",
        time: "01.02.2024 10:00",
        liters: "19",
        total: "95",
        icon: Some(COIN_ICON),
    }
}

pub fn sales_page(rows: &[SaleRow]) -> String {
    let body: String = rows
        .iter()
        .map(|row| {
            let icon = row
                .icon
                .map(|d| format!("<svg viewBox=\"64 64 896 896\"><path d=\"{}\"></path></svg>", d))
                .unwrap_or_default();
            format!(
                "<tr class=\"ant-table-row\"><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                row.number, row.address, row.time, row.liters, row.total, icon
            )
        })
        .collect();

    format!(
        "<html><body><div class=\"ant-table\"><table>\
         <thead><tr><th>No.</th><th>Address</th><th>Time</th><th>Liters</th><th>Total</th><th>Payment</th></tr></thead>\
         <tbody><tr aria-hidden=\"true\" class=\"ant-table-measure-row\"><td></td><td></td><td></td><td></td><td></td><td></td></tr>{}</tbody>\
         </table></div></body></html>",
        body
    )
}

/// `(name, id, flagged)` triples rendered as terminal cards.
pub fn terminals_page(terminals: &[(&str, &str, bool)]) -> String {
    let cards: String = terminals
        .iter()
        .map(|(name, id, flagged)| {
            let warning = if *flagged {
                "<span role=\"img\" class=\"anticon\"><svg data-icon=\"exclamation-circle\" viewBox=\"64 64 896 896\"><path d=\"M512 64z\"></path></svg></span>"
            } else {
                ""
            };
            format!(
                "<div class=\"terminal-card\"><a href=\"/terminal/{}\">{}</a>{}</div>",
                id, name, warning
            )
        })
        .collect();

    format!("<html><body><main>{}</main></body></html>", cards)
}

/// Helper to make HTTP requests to the test app
pub async fn make_request(
    app: Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> anyhow::Result<(axum::http::StatusCode, serde_json::Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request.body(match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    })?;

    let response = app.oneshot(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };
    Ok((status, json))
}
