use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::bookings::BookingEntity,
    value_objects::{
        enums::payment_types::PaymentType,
        time_ranges::TimeRange,
    },
};

/// Body of every reservation request coming from the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotRequest {
    pub court_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChargeIntentDto {
    pub intent_id: String,
    pub client_secret: Option<String>,
    pub amount_cents: i64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookingDto {
    pub id: Uuid,
    pub court_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub price_cents: i64,
    pub payment_type: String,
    pub status: String,
    pub created_at: DateTime<Utc>,
}

impl From<BookingEntity> for BookingDto {
    fn from(value: BookingEntity) -> Self {
        Self {
            id: value.id,
            court_id: value.court_id,
            start_at: value.start_at,
            end_at: value.end_at,
            price_cents: value.price_cents,
            payment_type: value.payment_type,
            status: value.status,
            created_at: value.created_at,
        }
    }
}

/// Credit-path booking; the repository runs every check and write in one serializable transaction.
#[derive(Debug, Clone, PartialEq)]
pub struct NewCreditBooking {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub court_id: Uuid,
    pub range: TimeRange,
    pub price_cents: i64,
    pub as_of: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CreditBookingOutcome {
    Created(BookingEntity),
    SlotTaken,
    InsufficientBalance { balance_cents: i64 },
}

/// Booking paid outside the ledger: through the gateway, or free of charge.
#[derive(Debug, Clone, PartialEq)]
pub struct NewPaidBooking {
    pub booking_id: Uuid,
    pub user_id: Uuid,
    pub court_id: Uuid,
    pub range: TimeRange,
    pub price_cents: i64,
    pub payment_type: PaymentType,
    pub external_payment_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaidBookingOutcome {
    Created(BookingEntity),
    SlotTaken,
    /// A booking already references the same external payment id.
    AlreadyRecorded(Uuid),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RefundMethod {
    Wallet,
    Gateway,
    None,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CancellationReceipt {
    pub booking_id: Uuid,
    pub refund_method: RefundMethod,
    pub refunded_cents: i64,
}
