use serde::{Deserialize, Serialize};

/// A terminal shown with a warning indicator on the terminals view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct TerminalProblem {
    #[serde(alias = "terminal")]
    pub terminal_name: String,
    #[serde(alias = "url")]
    pub terminal_url: String,
}

impl TerminalProblem {
    pub fn new(terminal_name: impl Into<String>, terminal_url: impl Into<String>) -> Self {
        Self {
            terminal_name: terminal_name.into(),
            terminal_url: terminal_url.into(),
        }
    }
}
