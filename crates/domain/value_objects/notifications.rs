use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::value_objects::{bookings::RefundMethod, enums::refund_reasons::RefundReason};

/// What the engine decided to tell a user; delivery belongs to an outside collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BookingNotification {
    BookingConfirmed {
        booking_id: Uuid,
        user_id: Uuid,
        court_id: Uuid,
        start_at: DateTime<Utc>,
        end_at: DateTime<Utc>,
        price_cents: i64,
        payment_type: String,
    },
    BookingCancelled {
        booking_id: Uuid,
        user_id: Uuid,
        start_at: DateTime<Utc>,
        refund_method: RefundMethod,
        refunded_cents: i64,
    },
    BookingReminder {
        booking_id: Uuid,
        user_id: Uuid,
        court_id: Uuid,
        start_at: DateTime<Utc>,
    },
    PaymentRefunded {
        user_id: Option<Uuid>,
        payment_id: String,
        reason: RefundReason,
    },
}

impl BookingNotification {
    pub fn kind(&self) -> &'static str {
        match self {
            BookingNotification::BookingConfirmed { .. } => "booking_confirmed",
            BookingNotification::BookingCancelled { .. } => "booking_cancelled",
            BookingNotification::BookingReminder { .. } => "booking_reminder",
            BookingNotification::PaymentRefunded { .. } => "payment_refunded",
        }
    }
}
