use serde::{Deserialize, Serialize};

use super::{SaleRecord, TerminalProblem};

/// The baseline persisted between cycles: the record sets seen by the last
/// successful scrape of each view.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct MonitorState {
    #[serde(default)]
    pub last_sales: Vec<SaleRecord>,
    #[serde(default, alias = "last_notifications")]
    pub last_problems: Vec<TerminalProblem>,
}

impl MonitorState {
    /// Builds the next baseline. A view that was not scraped this cycle keeps
    /// its previous snapshot; a scraped view is replaced wholesale.
    pub fn advance(
        &self,
        sales: Option<Vec<SaleRecord>>,
        problems: Option<Vec<TerminalProblem>>,
    ) -> MonitorState {
        MonitorState {
            last_sales: sales.unwrap_or_else(|| self.last_sales.clone()),
            last_problems: problems.unwrap_or_else(|| self.last_problems.clone()),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.last_sales.is_empty() && self.last_problems.is_empty()
    }
}
