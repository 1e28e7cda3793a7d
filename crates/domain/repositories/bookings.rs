use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::bookings::BookingEntity,
    value_objects::{
        bookings::{CreditBookingOutcome, NewCreditBooking, NewPaidBooking, PaidBookingOutcome},
        time_ranges::TimeRange,
        wallet::NewWalletTransaction,
    },
};

#[async_trait]
#[automock]
pub trait BookingRepository {
    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>>;
    async fn find_by_external_payment_id(
        &self,
        external_payment_id: String,
    ) -> Result<Option<BookingEntity>>;
    /// Pending and confirmed bookings on any of `court_ids` overlapping `range`.
    async fn list_slot_holding_overlapping(
        &self,
        court_ids: Vec<Uuid>,
        range: TimeRange,
    ) -> Result<Vec<BookingEntity>>;
    async fn has_slot_holding_overlap(&self, court_id: Uuid, range: TimeRange) -> Result<bool>;

    /// Overlap and blocked-slot checks, the balance check, the ledger debit and
    /// the booking insert in one serializable transaction.
    async fn create_credit_booking(&self, booking: NewCreditBooking)
    -> Result<CreditBookingOutcome>;
    /// Overlap, blocked-slot and payment-reference checks plus the confirmed
    /// insert in one serializable transaction.
    async fn create_confirmed_paid_booking(
        &self,
        booking: NewPaidBooking,
    ) -> Result<PaidBookingOutcome>;

    async fn insert_pending_booking(&self, booking: NewPaidBooking) -> Result<BookingEntity>;
    /// True when another slot-holding booking on the court overlaps `range` and
    /// was created before `created_at` (ties broken by id), or when a blocked
    /// slot covers `range`.
    async fn exists_earlier_overlapping(
        &self,
        booking_id: Uuid,
        court_id: Uuid,
        range: TimeRange,
        created_at: DateTime<Utc>,
    ) -> Result<bool>;
    async fn delete_booking(&self, booking_id: Uuid) -> Result<()>;
    /// pending -> confirmed; false when the row was no longer pending.
    async fn confirm_pending(&self, booking_id: Uuid) -> Result<bool>;

    /// confirmed -> cancelled; false when the row was no longer confirmed.
    async fn cancel_if_confirmed(&self, booking_id: Uuid) -> Result<bool>;
    /// confirmed -> cancelled plus the ledger refund row, atomically.
    async fn cancel_with_wallet_refund(
        &self,
        booking_id: Uuid,
        refund: NewWalletTransaction,
    ) -> Result<bool>;

    /// pending rows created before `cutoff` become expired.
    async fn expire_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<usize>;
    /// confirmed rows whose end has passed become completed.
    async fn complete_elapsed(&self, now: DateTime<Utc>) -> Result<usize>;
    async fn list_reminder_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BookingEntity>>;
    async fn mark_reminder_sent(&self, booking_id: Uuid) -> Result<bool>;
}
