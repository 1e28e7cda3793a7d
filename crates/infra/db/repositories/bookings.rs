use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{
    OptionalExtension, PgConnection, QueryResult, RunQueryDsl, delete, dsl::exists, insert_into,
    prelude::*, select, update,
};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::{
        postgres::{
            postgres_connection::PgPoolSquad,
            schema::{blocked_slots, bookings},
            transactions::{map_database_error, run_serializable},
        },
        repositories::wallet::append_ledger_rows,
    },
};
use domain::{
    entities::bookings::{BookingEntity, InsertBookingEntity},
    repositories::bookings::BookingRepository,
    value_objects::{
        bookings::{CreditBookingOutcome, NewCreditBooking, NewPaidBooking, PaidBookingOutcome},
        enums::{
            booking_statuses::BookingStatus, payment_types::PaymentType,
            wallet_transaction_types::WalletTransactionType,
        },
        time_ranges::TimeRange,
        wallet::NewWalletTransaction,
    },
};

pub struct BookingPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BookingPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

fn slot_taken(conn: &mut PgConnection, court_id: Uuid, range: &TimeRange) -> QueryResult<bool> {
    select(exists(
        bookings::table
            .filter(bookings::court_id.eq(court_id))
            .filter(bookings::status.eq_any(BookingStatus::slot_holding_values()))
            .filter(bookings::start_at.lt(range.end_at))
            .filter(bookings::end_at.gt(range.start_at)),
    ))
    .get_result::<bool>(conn)
}

fn slot_blocked(conn: &mut PgConnection, court_id: Uuid, range: &TimeRange) -> QueryResult<bool> {
    select(exists(
        blocked_slots::table
            .filter(
                blocked_slots::court_id
                    .eq(court_id)
                    .or(blocked_slots::court_id.is_null()),
            )
            .filter(blocked_slots::start_at.lt(range.end_at))
            .filter(blocked_slots::end_at.gt(range.start_at)),
    ))
    .get_result::<bool>(conn)
}

/// Held by another booking or covered by a block on this court or on all courts.
fn slot_unavailable(conn: &mut PgConnection, court_id: Uuid, range: &TimeRange) -> QueryResult<bool> {
    Ok(slot_taken(conn, court_id, range)? || slot_blocked(conn, court_id, range)?)
}

fn transition(
    conn: &mut PgConnection,
    booking_id: Uuid,
    from: BookingStatus,
    to: BookingStatus,
) -> QueryResult<bool> {
    let updated = update(
        bookings::table
            .filter(bookings::id.eq(booking_id))
            .filter(bookings::status.eq(from.as_str())),
    )
    .set((
        bookings::status.eq(to.as_str()),
        bookings::updated_at.eq(Utc::now()),
    ))
    .execute(conn)?;

    Ok(updated == 1)
}

fn insert_paid(
    conn: &mut PgConnection,
    booking: &NewPaidBooking,
    status: BookingStatus,
) -> QueryResult<BookingEntity> {
    let row = InsertBookingEntity {
        id: booking.booking_id,
        user_id: booking.user_id,
        court_id: booking.court_id,
        start_at: booking.range.start_at,
        end_at: booking.range.end_at,
        price_cents: booking.price_cents,
        payment_type: booking.payment_type.as_str().to_string(),
        status: status.as_str().to_string(),
        external_payment_id: booking.external_payment_id.clone(),
        credit_transaction_id: None,
    };

    insert_into(bookings::table)
        .values(&row)
        .returning(BookingEntity::as_select())
        .get_result::<BookingEntity>(conn)
}

#[async_trait]
impl BookingRepository for BookingPostgres {
    async fn find_by_id(&self, booking_id: Uuid) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let booking = bookings::table
            .filter(bookings::id.eq(booking_id))
            .select(BookingEntity::as_select())
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(booking)
    }

    async fn find_by_external_payment_id(
        &self,
        external_payment_id: String,
    ) -> Result<Option<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let booking = bookings::table
            .filter(bookings::external_payment_id.eq(external_payment_id))
            .select(BookingEntity::as_select())
            .first::<BookingEntity>(&mut conn)
            .optional()?;

        Ok(booking)
    }

    async fn list_slot_holding_overlapping(
        &self,
        court_ids: Vec<Uuid>,
        range: TimeRange,
    ) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = bookings::table
            .filter(bookings::court_id.eq_any(court_ids))
            .filter(bookings::status.eq_any(BookingStatus::slot_holding_values()))
            .filter(bookings::start_at.lt(range.end_at))
            .filter(bookings::end_at.gt(range.start_at))
            .select(BookingEntity::as_select())
            .order(bookings::start_at.asc())
            .load::<BookingEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn has_slot_holding_overlap(&self, court_id: Uuid, range: TimeRange) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        Ok(slot_taken(&mut conn, court_id, &range)?)
    }

    async fn create_credit_booking(
        &self,
        booking: NewCreditBooking,
    ) -> Result<CreditBookingOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        run_serializable(&mut conn, |conn| {
            if slot_unavailable(conn, booking.court_id, &booking.range)? {
                return Ok(CreditBookingOutcome::SlotTaken);
            }

            // Split per credit lot; each row takes the expiry of the purchase it spends.
            let debit = NewWalletTransaction {
                user_id: booking.user_id,
                transaction_type: WalletTransactionType::Payment,
                amount_cents: -booking.price_cents,
                expires_at: None,
                booking_id: Some(booking.booking_id),
                credit_pack_id: None,
                external_payment_id: None,
                as_of: booking.as_of,
            };

            // The ledger row points at the booking through a deferred foreign key.
            let payments = match append_ledger_rows(conn, &debit)? {
                Ok(payments) => payments,
                Err(shortfall) => {
                    return Ok(CreditBookingOutcome::InsufficientBalance {
                        balance_cents: shortfall.balance_cents,
                    });
                }
            };

            let row = InsertBookingEntity {
                id: booking.booking_id,
                user_id: booking.user_id,
                court_id: booking.court_id,
                start_at: booking.range.start_at,
                end_at: booking.range.end_at,
                price_cents: booking.price_cents,
                payment_type: PaymentType::Credit.as_str().to_string(),
                status: BookingStatus::Confirmed.as_str().to_string(),
                external_payment_id: None,
                credit_transaction_id: payments.first().map(|payment| payment.id),
            };

            let created = insert_into(bookings::table)
                .values(&row)
                .returning(BookingEntity::as_select())
                .get_result::<BookingEntity>(conn)?;

            Ok(CreditBookingOutcome::Created(created))
        })
    }

    async fn create_confirmed_paid_booking(
        &self,
        booking: NewPaidBooking,
    ) -> Result<PaidBookingOutcome> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        run_serializable(&mut conn, |conn| {
            if let Some(external_payment_id) = &booking.external_payment_id {
                let existing = bookings::table
                    .filter(bookings::external_payment_id.eq(external_payment_id))
                    .select(bookings::id)
                    .first::<Uuid>(conn)
                    .optional()?;

                if let Some(existing) = existing {
                    return Ok(PaidBookingOutcome::AlreadyRecorded(existing));
                }
            }

            if slot_unavailable(conn, booking.court_id, &booking.range)? {
                return Ok(PaidBookingOutcome::SlotTaken);
            }

            let created = insert_paid(conn, &booking, BookingStatus::Confirmed)?;
            Ok(PaidBookingOutcome::Created(created))
        })
    }

    async fn insert_pending_booking(&self, booking: NewPaidBooking) -> Result<BookingEntity> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        insert_paid(&mut conn, &booking, BookingStatus::Pending).map_err(map_database_error)
    }

    async fn exists_earlier_overlapping(
        &self,
        booking_id: Uuid,
        court_id: Uuid,
        range: TimeRange,
        created_at: DateTime<Utc>,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let earlier = select(exists(
            bookings::table
                .filter(bookings::id.ne(booking_id))
                .filter(bookings::court_id.eq(court_id))
                .filter(bookings::status.eq_any(BookingStatus::slot_holding_values()))
                .filter(bookings::start_at.lt(range.end_at))
                .filter(bookings::end_at.gt(range.start_at))
                .filter(
                    bookings::created_at.lt(created_at).or(bookings::created_at
                        .eq(created_at)
                        .and(bookings::id.lt(booking_id))),
                ),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(earlier || slot_blocked(&mut conn, court_id, &range)?)
    }

    async fn delete_booking(&self, booking_id: Uuid) -> Result<()> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        delete(bookings::table.filter(bookings::id.eq(booking_id))).execute(&mut conn)?;

        Ok(())
    }

    async fn confirm_pending(&self, booking_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        Ok(transition(
            &mut conn,
            booking_id,
            BookingStatus::Pending,
            BookingStatus::Confirmed,
        )?)
    }

    async fn cancel_if_confirmed(&self, booking_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        Ok(transition(
            &mut conn,
            booking_id,
            BookingStatus::Confirmed,
            BookingStatus::Cancelled,
        )?)
    }

    async fn cancel_with_wallet_refund(
        &self,
        booking_id: Uuid,
        refund: NewWalletTransaction,
    ) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        run_serializable(&mut conn, |conn| {
            if !transition(
                conn,
                booking_id,
                BookingStatus::Confirmed,
                BookingStatus::Cancelled,
            )? {
                return Ok(false);
            }

            // Only payments can be refused for balance; anything else aborts.
            match append_ledger_rows(conn, &refund)? {
                Ok(_) => Ok(true),
                Err(_) => Err(diesel::result::Error::RollbackTransaction),
            }
        })
    }

    async fn expire_stale_pending(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let expired = update(
            bookings::table
                .filter(bookings::status.eq(BookingStatus::Pending.as_str()))
                .filter(bookings::created_at.lt(cutoff)),
        )
        .set((
            bookings::status.eq(BookingStatus::Expired.as_str()),
            bookings::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(expired)
    }

    async fn complete_elapsed(&self, now: DateTime<Utc>) -> Result<usize> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let completed = update(
            bookings::table
                .filter(bookings::status.eq(BookingStatus::Confirmed.as_str()))
                .filter(bookings::end_at.le(now)),
        )
        .set((
            bookings::status.eq(BookingStatus::Completed.as_str()),
            bookings::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(completed)
    }

    async fn list_reminder_candidates(
        &self,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<BookingEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = bookings::table
            .filter(bookings::status.eq(BookingStatus::Confirmed.as_str()))
            .filter(bookings::reminder_sent.eq(false))
            .filter(bookings::start_at.ge(from))
            .filter(bookings::start_at.lt(to))
            .select(BookingEntity::as_select())
            .order(bookings::start_at.asc())
            .load::<BookingEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn mark_reminder_sent(&self, booking_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let updated = update(
            bookings::table
                .filter(bookings::id.eq(booking_id))
                .filter(bookings::status.eq(BookingStatus::Confirmed.as_str()))
                .filter(bookings::reminder_sent.eq(false)),
        )
        .set((
            bookings::reminder_sent.eq(true),
            bookings::updated_at.eq(Utc::now()),
        ))
        .execute(&mut conn)?;

        Ok(updated == 1)
    }
}
