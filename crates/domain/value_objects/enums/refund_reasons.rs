use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RefundReason {
    /// The user cancelled a confirmed booking in time.
    CustomerCancellation,
    /// Payment landed on a slot that another booking already holds.
    SlotConflict,
    /// Paid amount differs from the price of what was bought.
    AmountMismatch,
    /// Payment references a user, court or pack that cannot be resolved.
    InvalidReference,
}

impl RefundReason {
    /// Tag stored on the gateway refund's metadata.
    pub fn tag(&self) -> &'static str {
        match self {
            RefundReason::CustomerCancellation => "customer_cancellation",
            RefundReason::SlotConflict => "duplicate",
            RefundReason::AmountMismatch => "suspected_fraud",
            RefundReason::InvalidReference => "invalid_reference",
        }
    }

    /// Stripe only accepts `duplicate`, `fraudulent` and `requested_by_customer`.
    pub fn stripe_reason(&self) -> Option<&'static str> {
        match self {
            RefundReason::CustomerCancellation => Some("requested_by_customer"),
            RefundReason::SlotConflict => Some("duplicate"),
            RefundReason::AmountMismatch => Some("fraudulent"),
            RefundReason::InvalidReference => None,
        }
    }

    pub fn is_compensating(&self) -> bool {
        !matches!(self, RefundReason::CustomerCancellation)
    }
}

impl Display for RefundReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}
