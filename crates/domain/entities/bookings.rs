use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::{booking_statuses::BookingStatus, payment_types::PaymentType},
        time_ranges::TimeRange,
    },
    infra::db::postgres::schema::bookings,
};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = bookings)]
pub struct BookingEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub court_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub price_cents: i64,
    pub payment_type: String,
    pub status: String,
    pub external_payment_id: Option<String>,
    pub credit_transaction_id: Option<Uuid>,
    pub reminder_sent: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl BookingEntity {
    pub fn range(&self) -> TimeRange {
        TimeRange::new_unchecked(self.start_at, self.end_at)
    }

    pub fn status(&self) -> Option<BookingStatus> {
        BookingStatus::from_str(&self.status)
    }

    pub fn payment_type(&self) -> Option<PaymentType> {
        PaymentType::from_str(&self.payment_type)
    }

    /// Pending and confirmed bookings hold their slot.
    pub fn holds_slot(&self) -> bool {
        self.status().is_some_and(|status| status.holds_slot())
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = bookings)]
pub struct InsertBookingEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub court_id: Uuid,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub price_cents: i64,
    pub payment_type: String,
    pub status: String,
    pub external_payment_id: Option<String>,
    pub credit_transaction_id: Option<Uuid>,
}
