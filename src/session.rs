use headless_chrome::{Browser, LaunchOptions, Tab};
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::{ScraperConfig, SelectorConfig};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Failed to launch browser: {0}")]
    Launch(String),

    #[error("Navigation to {url} failed: {message}")]
    Navigation { url: String, message: String },

    #[error("Element not found: {selector}")]
    MissingElement { selector: String },

    #[error("Browser interaction failed: {0}")]
    Interaction(String),

    #[error("Session already closed")]
    Closed,
}

/// Login entry point and the account used on it.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub login_url: String,
    pub username: String,
    pub password: String,
}

/// Result of a login attempt that did not hit a structural page fault.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Timeout,
}

/// An authenticated browsing context owned by exactly one cycle.
pub trait DashboardSession: Send {
    fn authenticate(&mut self, credentials: &Credentials) -> Result<AuthOutcome, SessionError>;

    /// Loads a view and waits for it to settle before extraction.
    fn navigate(&mut self, url: &str) -> Result<(), SessionError>;

    /// Serialized DOM of the current page.
    fn page_html(&self) -> Result<String, SessionError>;

    /// Releases the browser. Safe to call more than once.
    fn close(&mut self);
}

pub trait SessionFactory: Send + Sync {
    fn open(&self) -> Result<Box<dyn DashboardSession>, SessionError>;
}

/// Launches one isolated headless Chrome per session.
#[derive(Debug, Clone)]
pub struct ChromeSessionFactory {
    config: ScraperConfig,
}

impl ChromeSessionFactory {
    pub fn new(config: ScraperConfig) -> Self {
        Self { config }
    }

    fn launch_options(&self) -> Result<LaunchOptions<'static>, SessionError> {
        let mut launch_options = LaunchOptions::default_builder()
            .headless(self.config.headless)
            .sandbox(false) // Often needed in containerized environments
            .window_size(Some((self.config.window_width, self.config.window_height)))
            .idle_browser_timeout(Duration::from_secs(self.config.idle_browser_timeout_secs))
            .args(vec![
                OsStr::new("--no-sandbox"),
                OsStr::new("--disable-dev-shm-usage"),
                OsStr::new("--disable-gpu"),
                OsStr::new("--disable-extensions"),
            ])
            .build()
            .map_err(|e| SessionError::Launch(format!("invalid launch options: {}", e)))?;

        if let Some(chrome_path) = &self.config.chrome_path {
            launch_options.path = Some(std::path::PathBuf::from(chrome_path));
        }

        Ok(launch_options)
    }
}

impl SessionFactory for ChromeSessionFactory {
    fn open(&self) -> Result<Box<dyn DashboardSession>, SessionError> {
        let browser = Browser::new(self.launch_options()?)
            .map_err(|e| SessionError::Launch(e.to_string()))?;
        let tab = browser
            .new_tab()
            .map_err(|e| SessionError::Launch(format!("failed to create tab: {}", e)))?;

        tracing::debug!(
            width = self.config.window_width,
            height = self.config.window_height,
            "Browser session opened"
        );

        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            tab: Some(tab),
            config: self.config.clone(),
        }))
    }
}

pub struct ChromeSession {
    browser: Option<Browser>,
    tab: Option<Arc<Tab>>,
    config: ScraperConfig,
}

impl ChromeSession {
    fn tab(&self) -> Result<&Arc<Tab>, SessionError> {
        self.tab.as_ref().ok_or(SessionError::Closed)
    }

    fn selectors(&self) -> &SelectorConfig {
        &self.config.selectors
    }

    fn load(&self, url: &str) -> Result<(), SessionError> {
        let tab = self.tab()?;
        tab.navigate_to(url)
            .and_then(|tab| tab.wait_until_navigated())
            .map_err(|e| SessionError::Navigation {
                url: url.to_string(),
                message: e.to_string(),
            })?;
        Ok(())
    }

    fn dismiss_consent(&self) -> Result<(), SessionError> {
        let tab = self.tab()?;
        let selector = &self.selectors().consent_button;
        let timeout = Duration::from_millis(self.config.consent_timeout_ms);

        match tab.wait_for_element_with_custom_timeout(selector, timeout) {
            Ok(button) => match button.click() {
                Ok(_) => {
                    std::thread::sleep(Duration::from_secs(2));
                    tracing::debug!("Consent dialog dismissed");
                }
                Err(e) => tracing::debug!("Consent button not clickable, continuing: {}", e),
            },
            Err(_) => tracing::debug!("No consent dialog shown"),
        }
        Ok(())
    }

    fn fill(&self, selector: &str, value: &str) -> Result<(), SessionError> {
        let tab = self.tab()?;
        let field = tab.find_element(selector).map_err(|_| SessionError::MissingElement {
            selector: selector.to_string(),
        })?;
        field
            .click()
            .and_then(|field| field.type_into(value))
            .map_err(|e| SessionError::Interaction(format!("typing into {}: {}", selector, e)))?;
        std::thread::sleep(Duration::from_secs(1));
        Ok(())
    }
}

impl DashboardSession for ChromeSession {
    fn authenticate(&mut self, credentials: &Credentials) -> Result<AuthOutcome, SessionError> {
        let selectors = self.selectors().clone();
        self.load(&credentials.login_url)?;
        self.dismiss_consent()?;

        self.fill(&selectors.login_input, &credentials.username)?;
        self.fill(&selectors.password_input, &credentials.password)?;

        let tab = self.tab()?;
        // Submit becomes enabled only once both fields are filled
        let submit = tab
            .find_element(&selectors.submit_button)
            .map_err(|_| SessionError::MissingElement {
                selector: selectors.submit_button.clone(),
            })?;
        submit
            .click()
            .map_err(|e| SessionError::Interaction(format!("submit click: {}", e)))?;

        let timeout = Duration::from_millis(self.config.login_timeout_ms);
        match tab.wait_for_element_with_custom_timeout(&selectors.logged_in_marker, timeout) {
            Ok(_) => Ok(AuthOutcome::Success),
            Err(e) => {
                tracing::warn!("Post-login marker did not appear: {}", e);
                Ok(AuthOutcome::Timeout)
            }
        }
    }

    fn navigate(&mut self, url: &str) -> Result<(), SessionError> {
        self.load(url)?;
        // The dashboard renders tables asynchronously after navigation
        std::thread::sleep(Duration::from_millis(self.config.settle_delay_ms));
        Ok(())
    }

    fn page_html(&self) -> Result<String, SessionError> {
        self.tab()?
            .get_content()
            .map_err(|e| SessionError::Interaction(format!("failed to get page content: {}", e)))
    }

    fn close(&mut self) {
        if let Some(tab) = self.tab.take() {
            let _ = tab.close(true);
        }
        if self.browser.take().is_some() {
            tracing::debug!("Browser session closed");
        }
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        self.close();
    }
}
