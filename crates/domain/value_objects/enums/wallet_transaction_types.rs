use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum WalletTransactionType {
    Purchase,
    Payment,
    Refund,
    Expiration,
}

impl WalletTransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WalletTransactionType::Purchase => "purchase",
            WalletTransactionType::Payment => "payment",
            WalletTransactionType::Refund => "refund",
            WalletTransactionType::Expiration => "expiration",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "purchase" => Some(WalletTransactionType::Purchase),
            "payment" => Some(WalletTransactionType::Payment),
            "refund" => Some(WalletTransactionType::Refund),
            "expiration" => Some(WalletTransactionType::Expiration),
            _ => None,
        }
    }

    /// Whether `amount_cents` carries the sign this type requires.
    pub fn accepts_amount(&self, amount_cents: i64) -> bool {
        match self {
            WalletTransactionType::Purchase | WalletTransactionType::Refund => amount_cents > 0,
            WalletTransactionType::Payment => amount_cents < 0,
            WalletTransactionType::Expiration => amount_cents <= 0,
        }
    }
}

impl Display for WalletTransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
