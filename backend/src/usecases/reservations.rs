use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::domain::{
    entities::{bookings::BookingEntity, courts::CourtEntity},
    repositories::{
        blocked_slots::BlockedSlotRepository, bookings::BookingRepository,
        courts::CourtRepository, notifications::BookingNotifier,
    },
    value_objects::{
        booking_policy::BookingPolicy,
        bookings::{
            BookingDto, ChargeIntentDto, CreditBookingOutcome, NewCreditBooking, NewPaidBooking,
            PaidBookingOutcome, SlotRequest,
        },
        enums::{booking_statuses::BookingStatus, payment_types::PaymentType},
        notifications::BookingNotification,
        payment_events::ChargeMetadata,
        slot_grid::is_canonical_slot,
        storage_errors::{DuplicateRecord, SlotOverlap},
        time_ranges::TimeRange,
    },
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    errors::{BookingError, UseCaseResult},
    payment_gateway::PaymentGateway,
    retry::ConflictRetry,
};

const BOOKINGS_EXTERNAL_PAYMENT_KEY: &str = "bookings_external_payment_id_key";

/// How a booking outside the credit path claims its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReservationStrategy {
    /// Overlap check and insert inside one serializable transaction.
    #[default]
    Serializable,
    /// Insert as pending, reconcile against earlier rows, then confirm.
    Optimistic,
}

impl ReservationStrategy {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "serializable" => Some(ReservationStrategy::Serializable),
            "optimistic" => Some(ReservationStrategy::Optimistic),
            _ => None,
        }
    }
}

/// Claims a slot for a booking that needs no ledger debit: gateway-paid or free.
pub struct SlotReserver<B>
where
    B: BookingRepository + Send + Sync + 'static,
{
    booking_repo: Arc<B>,
    strategy: ReservationStrategy,
    retry: ConflictRetry,
}

impl<B> SlotReserver<B>
where
    B: BookingRepository + Send + Sync + 'static,
{
    pub fn new(booking_repo: Arc<B>, strategy: ReservationStrategy, retry: ConflictRetry) -> Self {
        Self {
            booking_repo,
            strategy,
            retry,
        }
    }

    pub async fn reserve(&self, booking: NewPaidBooking) -> anyhow::Result<PaidBookingOutcome> {
        let attempt = match self.strategy {
            ReservationStrategy::Serializable => {
                self.retry
                    .run("reserve slot", || {
                        let repo = Arc::clone(&self.booking_repo);
                        let booking = booking.clone();
                        async move { repo.create_confirmed_paid_booking(booking).await }
                    })
                    .await
            }
            ReservationStrategy::Optimistic => self.reserve_optimistic(&booking).await,
        };

        match attempt {
            Ok(outcome) => Ok(outcome),
            Err(err) if err.is::<SlotOverlap>() => {
                info!(
                    court_id = %booking.court_id,
                    start_at = %booking.range.start_at,
                    "reservations: storage constraint rejected overlapping booking"
                );
                Ok(PaidBookingOutcome::SlotTaken)
            }
            Err(err) if is_duplicate_payment(&err) => self.already_recorded(&booking).await,
            Err(err) => Err(err),
        }
    }

    async fn reserve_optimistic(&self, booking: &NewPaidBooking) -> anyhow::Result<PaidBookingOutcome> {
        if let Some(external_payment_id) = booking.external_payment_id.clone() {
            if let Some(existing) = self
                .booking_repo
                .find_by_external_payment_id(external_payment_id)
                .await?
            {
                return Ok(PaidBookingOutcome::AlreadyRecorded(existing.id));
            }
        }

        let mut pending = self.booking_repo.insert_pending_booking(booking.clone()).await?;

        let lost = self
            .booking_repo
            .exists_earlier_overlapping(pending.id, pending.court_id, pending.range(), pending.created_at)
            .await?;
        if lost {
            self.booking_repo.delete_booking(pending.id).await?;
            info!(
                booking_id = %pending.id,
                court_id = %pending.court_id,
                "reservations: optimistic insert lost to an earlier booking"
            );
            return Ok(PaidBookingOutcome::SlotTaken);
        }

        if !self.booking_repo.confirm_pending(pending.id).await? {
            warn!(booking_id = %pending.id, "reservations: pending booking left pending state before confirmation");
            return Ok(PaidBookingOutcome::SlotTaken);
        }

        pending.status = BookingStatus::Confirmed.as_str().to_string();
        Ok(PaidBookingOutcome::Created(pending))
    }

    async fn already_recorded(&self, booking: &NewPaidBooking) -> anyhow::Result<PaidBookingOutcome> {
        let Some(external_payment_id) = booking.external_payment_id.clone() else {
            anyhow::bail!("duplicate booking rejected without an external payment id");
        };

        match self
            .booking_repo
            .find_by_external_payment_id(external_payment_id)
            .await?
        {
            Some(existing) => Ok(PaidBookingOutcome::AlreadyRecorded(existing.id)),
            None => anyhow::bail!("duplicate payment reference reported but no booking holds it"),
        }
    }
}

fn is_duplicate_payment(err: &anyhow::Error) -> bool {
    err.downcast_ref::<DuplicateRecord>()
        .is_some_and(|duplicate| duplicate.constraint == BOOKINGS_EXTERNAL_PAYMENT_KEY)
}

pub struct ReservationUseCase<C, B, BS, G, N>
where
    C: CourtRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    BS: BlockedSlotRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    court_repo: Arc<C>,
    booking_repo: Arc<B>,
    blocked_slot_repo: Arc<BS>,
    gateway: Arc<G>,
    notifier: Arc<N>,
    reserver: SlotReserver<B>,
    policy: BookingPolicy,
    retry: ConflictRetry,
}

impl<C, B, BS, G, N> ReservationUseCase<C, B, BS, G, N>
where
    C: CourtRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    BS: BlockedSlotRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    pub fn new(
        court_repo: Arc<C>,
        booking_repo: Arc<B>,
        blocked_slot_repo: Arc<BS>,
        gateway: Arc<G>,
        notifier: Arc<N>,
        policy: BookingPolicy,
        retry: ConflictRetry,
        strategy: ReservationStrategy,
    ) -> Self {
        let reserver = SlotReserver::new(Arc::clone(&booking_repo), strategy, retry.clone());
        Self {
            court_repo,
            booking_repo,
            blocked_slot_repo,
            gateway,
            notifier,
            reserver,
            policy,
            retry,
        }
    }

    /// Checks that `range` is a bookable slot of an active court and returns the
    /// court. A blocked range is a `Conflict`, like a taken one.
    pub async fn validate_slot(
        &self,
        court_id: Uuid,
        range: &TimeRange,
        now: DateTime<Utc>,
    ) -> UseCaseResult<CourtEntity> {
        let court = self
            .court_repo
            .find_active_by_id(court_id)
            .await
            .map_err(|err| {
                error!(%court_id, db_error = ?err, "reservations: failed to load court");
                BookingError::Internal(err)
            })?
            .ok_or_else(|| BookingError::NotFound(format!("court {court_id}")))?;

        if range.start_at <= now {
            return Err(BookingError::Validation(
                "slot start must be in the future".to_string(),
            ));
        }

        if range.duration_minutes() != i64::from(court.duration_minutes) {
            return Err(BookingError::Validation(format!(
                "slot must last exactly {} minutes",
                court.duration_minutes
            )));
        }

        if !is_canonical_slot(
            self.policy.slot_layout,
            &self.policy.opening_hours,
            range,
            court.duration_minutes.into(),
        ) {
            return Err(BookingError::Validation(
                "slot does not align with the court schedule".to_string(),
            ));
        }

        if range.start_at > self.policy.booking_horizon(now) {
            return Err(BookingError::Validation(format!(
                "slots can be booked at most {} days ahead",
                self.policy.max_advance_days
            )));
        }

        self.ensure_not_blocked(court.id, range).await?;

        Ok(court)
    }

    /// Phase one of the card path; the booking itself is created from the
    /// confirmed payment event.
    pub async fn create_charge_intent(
        &self,
        user_id: Uuid,
        request: SlotRequest,
        now: DateTime<Utc>,
    ) -> UseCaseResult<ChargeIntentDto> {
        let range = slot_range(&request)?;
        let court = self.validate_slot(request.court_id, &range, now).await?;

        if court.price_cents == 0 {
            return Err(BookingError::Validation(
                "free courts are booked without a card payment".to_string(),
            ));
        }

        self.ensure_slot_free(court.id, range).await?;

        let metadata = ChargeMetadata::Booking {
            user_id,
            court_id: court.id,
            range,
        }
        .to_metadata();
        let idempotency_key = format!(
            "booking-intent-{}-{}-{}",
            user_id,
            court.id,
            range.start_at.timestamp()
        );

        let intent = self
            .gateway
            .create_charge_intent(court.price_cents, metadata, idempotency_key)
            .await
            .map_err(|err| {
                error!(%user_id, court_id = %court.id, gateway_error = ?err, "reservations: charge intent failed");
                BookingError::ExternalService("payment provider unavailable".to_string())
            })?;

        info!(
            %user_id,
            court_id = %court.id,
            intent_id = %intent.id,
            amount_cents = court.price_cents,
            "reservations: charge intent created"
        );

        Ok(ChargeIntentDto {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_cents: court.price_cents,
        })
    }

    /// Books with wallet credits; courts priced at zero are booked as free.
    pub async fn pay_with_credits(
        &self,
        user_id: Uuid,
        request: SlotRequest,
        now: DateTime<Utc>,
    ) -> UseCaseResult<BookingDto> {
        let range = slot_range(&request)?;
        let court = self.validate_slot(request.court_id, &range, now).await?;

        if court.price_cents == 0 {
            return self.book_free(user_id, &court, range).await;
        }

        let booking = NewCreditBooking {
            booking_id: Uuid::new_v4(),
            user_id,
            court_id: court.id,
            range,
            price_cents: court.price_cents,
            as_of: now,
        };

        let outcome = self
            .retry
            .run("credit booking", || {
                let repo = Arc::clone(&self.booking_repo);
                let booking = booking.clone();
                async move { repo.create_credit_booking(booking).await }
            })
            .await
            .map_err(|err| {
                error!(%user_id, court_id = %court.id, db_error = ?err, "reservations: credit booking failed");
                BookingError::from_storage(err)
            })?;

        match outcome {
            CreditBookingOutcome::Created(created) => {
                info!(
                    %user_id,
                    booking_id = %created.id,
                    court_id = %created.court_id,
                    price_cents = created.price_cents,
                    "reservations: credit booking created"
                );
                self.notify_confirmed(&created).await;
                Ok(BookingDto::from(created))
            }
            CreditBookingOutcome::SlotTaken => Err(slot_taken()),
            CreditBookingOutcome::InsufficientBalance { balance_cents } => {
                info!(%user_id, balance_cents, required_cents = court.price_cents, "reservations: insufficient credits");
                Err(BookingError::InsufficientBalance {
                    balance_cents,
                    required_cents: court.price_cents,
                })
            }
        }
    }

    async fn book_free(
        &self,
        user_id: Uuid,
        court: &CourtEntity,
        range: TimeRange,
    ) -> UseCaseResult<BookingDto> {
        let booking = NewPaidBooking {
            booking_id: Uuid::new_v4(),
            user_id,
            court_id: court.id,
            range,
            price_cents: 0,
            payment_type: PaymentType::Free,
            external_payment_id: None,
        };

        let outcome = self.reserver.reserve(booking).await.map_err(|err| {
            error!(%user_id, court_id = %court.id, db_error = ?err, "reservations: free booking failed");
            BookingError::from_storage(err)
        })?;

        match outcome {
            PaidBookingOutcome::Created(created) => {
                info!(%user_id, booking_id = %created.id, "reservations: free booking created");
                self.notify_confirmed(&created).await;
                Ok(BookingDto::from(created))
            }
            PaidBookingOutcome::SlotTaken | PaidBookingOutcome::AlreadyRecorded(_) => {
                Err(slot_taken())
            }
        }
    }

    async fn ensure_slot_free(&self, court_id: Uuid, range: TimeRange) -> UseCaseResult<()> {
        let taken = self
            .booking_repo
            .has_slot_holding_overlap(court_id, range)
            .await
            .map_err(|err| {
                error!(%court_id, db_error = ?err, "reservations: overlap pre-check failed");
                BookingError::Internal(err)
            })?;

        if taken {
            return Err(slot_taken());
        }
        Ok(())
    }

    async fn ensure_not_blocked(&self, court_id: Uuid, range: &TimeRange) -> UseCaseResult<()> {
        let blocks = self
            .blocked_slot_repo
            .list_overlapping(*range)
            .await
            .map_err(|err| {
                error!(%court_id, db_error = ?err, "reservations: failed to load blocked slots");
                BookingError::Internal(err)
            })?;

        if let Some(block) = blocks.iter().find(|block| block.applies_to(court_id)) {
            info!(
                %court_id,
                block_id = %block.id,
                start_at = %range.start_at,
                "reservations: slot is blocked"
            );
            return Err(BookingError::Conflict("slot is blocked".to_string()));
        }
        Ok(())
    }

    async fn notify_confirmed(&self, booking: &BookingEntity) {
        let notification = BookingNotification::BookingConfirmed {
            booking_id: booking.id,
            user_id: booking.user_id,
            court_id: booking.court_id,
            start_at: booking.start_at,
            end_at: booking.end_at,
            price_cents: booking.price_cents,
            payment_type: booking.payment_type.clone(),
        };
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(booking_id = %booking.id, notify_error = ?err, "reservations: confirmation notification failed");
        }
    }
}

fn slot_range(request: &SlotRequest) -> UseCaseResult<TimeRange> {
    TimeRange::new(request.start_at, request.end_at)
        .map_err(|err| BookingError::Validation(err.to_string()))
}

fn slot_taken() -> BookingError {
    BookingError::Conflict("slot is already booked".to_string())
}
