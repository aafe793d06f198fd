use serde::{Deserialize, Serialize};

/// How a sale was paid, recognised from the icon in the payment column.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Card,
    Cash,
    Coin,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PaymentMethod {
    pub fn label(&self) -> &'static str {
        match self {
            PaymentMethod::Card => "Card",
            PaymentMethod::Cash => "Cash",
            PaymentMethod::Coin => "Coin",
            PaymentMethod::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// One row of the sales table.
///
/// The dashboard exposes no stable identifier for a sale, so two records are
/// the same sale only when every field matches.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct SaleRecord {
    pub number: String,
    pub address: String,
    #[serde(alias = "time")]
    pub timestamp: String,
    pub liters: String,
    pub total: String,
    #[serde(default, alias = "payment")]
    pub payment_method: PaymentMethod,
}
