use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::env;
use url::Url;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub dashboard: DashboardConfig,
    pub scraper: ScraperConfig,
    pub storage: StorageConfig,
    pub notifications: NotificationsConfig,
    pub scheduler: SchedulerConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    pub login_url: String,
    pub sales_url: String,
    pub terminals_url: String,
    pub username: String,
    #[serde(skip_serializing)]
    pub password: String,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            login_url: "https://my.alivewater.cloud".to_string(),
            sales_url: "https://my.alivewater.cloud/sales".to_string(),
            terminals_url: "https://my.alivewater.cloud/terminals".to_string(),
            username: String::new(),
            password: String::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub chrome_path: Option<String>,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    pub settle_delay_ms: u64,
    pub consent_timeout_ms: u64,
    pub login_timeout_ms: u64,
    pub idle_browser_timeout_secs: u64,
    pub selectors: SelectorConfig,
    pub payment_icons: PaymentIconConfig,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            chrome_path: None,
            headless: true,
            window_width: 1920,
            window_height: 1080,
            settle_delay_ms: 3000,
            consent_timeout_ms: 10_000,
            login_timeout_ms: 10_000,
            idle_browser_timeout_secs: 60,
            selectors: SelectorConfig::default(),
            payment_icons: PaymentIconConfig::default(),
        }
    }
}

/// CSS selectors that make up the dashboard's page contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorConfig {
    pub consent_button: String,
    pub login_input: String,
    pub password_input: String,
    pub submit_button: String,
    pub logged_in_marker: String,
    pub sales_table: String,
    pub sales_rows: String,
    pub warning_icon: String,
    pub terminal_link: String,
}

impl Default for SelectorConfig {
    fn default() -> Self {
        Self {
            consent_button: "button.ant-btn-primary".to_string(),
            login_input: "input[name='login']".to_string(),
            password_input: "input[name='password']".to_string(),
            submit_button: "button[type='submit']".to_string(),
            logged_in_marker: "._container_iuuwv_1".to_string(),
            sales_table: "table".to_string(),
            sales_rows: "tbody tr".to_string(),
            warning_icon: "svg[data-icon='exclamation-circle']".to_string(),
            terminal_link: "a[href^='/terminal/']".to_string(),
        }
    }
}

/// Fragments of SVG path data identifying each payment icon.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentIconConfig {
    pub card: String,
    pub cash: String,
    pub coin: String,
}

impl Default for PaymentIconConfig {
    fn default() -> Self {
        Self {
            // Inner subpaths only; the outer frames are shared with other icons
            card: "zm-792 72h752v120H136V232z".to_string(),
            cash: "zm-40 464H528V448h312v128z".to_string(),
            coin: "zm47.7-395.2l-25.4-5.9V348.6".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub state_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            state_file: "data.json".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NotificationsConfig {
    pub recipients: Vec<String>,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelegramConfig {
    #[serde(skip_serializing)]
    pub bot_token: String,
    pub api_base_url: String,
    pub disable_web_page_preview: bool,
    pub request_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_base_url: "https://api.telegram.org".to_string(),
            disable_web_page_preview: true,
            request_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub interval_secs: u64,
    pub run_on_start: bool,
    pub cycle_timeout_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval_secs: 300,
            run_on_start: true,
            cycle_timeout_secs: 240,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Callers allowed to trigger a cycle. Empty means the notification
    /// recipients.
    pub allowed_callers: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            allowed_callers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub directory: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            directory: None,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let s = Config::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Local overrides (ignored by git)
            .add_source(File::with_name("config/local").required(false))
            .add_source(Environment::with_prefix("ALIVEWATER").separator("__"))
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        config.apply_legacy_env();
        config.validate()?;
        Ok(config)
    }

    /// Fills unset credentials from the plain variable names used by
    /// existing deployments.
    fn apply_legacy_env(&mut self) {
        if self.dashboard.username.is_empty() {
            if let Ok(login) = env::var("LOGIN") {
                self.dashboard.username = login;
            }
        }
        if self.dashboard.password.is_empty() {
            if let Ok(password) = env::var("PASSWORD") {
                self.dashboard.password = password;
            }
        }
        if self.notifications.telegram.bot_token.is_empty() {
            if let Ok(token) = env::var("TELEGRAM_TOKEN") {
                self.notifications.telegram.bot_token = token;
            }
        }
        if self.notifications.recipients.is_empty() {
            if let Ok(ids) = env::var("TELEGRAM_ADMIN_IDS") {
                self.notifications.recipients = parse_id_list(&ids);
            }
        }
        if self.scraper.chrome_path.is_none() {
            self.scraper.chrome_path = env::var("CHROME_PATH").ok();
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, value) in [
            ("dashboard.login_url", &self.dashboard.login_url),
            ("dashboard.sales_url", &self.dashboard.sales_url),
            ("dashboard.terminals_url", &self.dashboard.terminals_url),
        ] {
            if Url::parse(value).is_err() {
                return Err(ConfigError::Message(format!("Invalid URL in {}", name)));
            }
        }

        if self.dashboard.username.trim().is_empty() || self.dashboard.password.is_empty() {
            return Err(ConfigError::Message("Dashboard username and password are required".into()));
        }

        if self.notifications.recipients.is_empty() {
            return Err(ConfigError::Message("At least one notification recipient is required".into()));
        }

        if self.notifications.telegram.bot_token.is_empty() {
            return Err(ConfigError::Message("Telegram bot_token is required".into()));
        }

        if Url::parse(&self.notifications.telegram.api_base_url).is_err() {
            return Err(ConfigError::Message("Invalid Telegram api_base_url".into()));
        }

        if self.scraper.window_width == 0 || self.scraper.window_height == 0 {
            return Err(ConfigError::Message("Scraper window size must be greater than 0".into()));
        }

        if self.scraper.login_timeout_ms == 0 || self.scraper.consent_timeout_ms == 0 {
            return Err(ConfigError::Message("Scraper timeouts must be greater than 0".into()));
        }

        if self.scheduler.interval_secs == 0 {
            return Err(ConfigError::Message("Scheduler interval_secs must be greater than 0".into()));
        }

        if self.scheduler.cycle_timeout_secs == 0 {
            return Err(ConfigError::Message("Scheduler cycle_timeout_secs must be greater than 0".into()));
        }

        if self.server.port == 0 {
            return Err(ConfigError::Message("Server port must be greater than 0".into()));
        }

        Ok(())
    }

    pub fn allowed_callers(&self) -> &[String] {
        if self.server.allowed_callers.is_empty() {
            &self.notifications.recipients
        } else {
            &self.server.allowed_callers
        }
    }
}

fn parse_id_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
pub(crate) fn test_config() -> AppConfig {
    let mut config = AppConfig::default();
    config.dashboard.username = "operator".to_string();
    config.dashboard.password = "secret".to_string();
    config.notifications.recipients = vec!["1371753467".to_string(), "867982256".to_string()];
    config.notifications.telegram.bot_token = "123:abc".to_string();
    config
}
