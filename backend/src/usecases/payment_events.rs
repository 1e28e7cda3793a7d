use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::processed_payment_events::InsertProcessedPaymentEventEntity,
        repositories::{
            bookings::BookingRepository, courts::CourtRepository,
            credit_packs::CreditPackRepository, notifications::BookingNotifier,
            payment_events::PaymentEventRepository, users::UserRepository,
            wallet::WalletRepository,
        },
        value_objects::{
            bookings::{NewPaidBooking, PaidBookingOutcome},
            enums::{payment_types::PaymentType, refund_reasons::RefundReason},
            notifications::BookingNotification,
            payment_events::{ChargeMetadata, PaymentEventOutcome, WebhookAck},
            storage_errors::DuplicateRecord,
            time_ranges::TimeRange,
        },
    },
    infra::cache::processed_events::ProcessedEventCache,
    payments::stripe_client::{PAYMENT_INTENT_SUCCEEDED, RefundOutcome, StripeClient, StripePaymentIntent},
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    errors::{BookingError, UseCaseResult},
    payment_gateway::PaymentGateway,
    reservations::SlotReserver,
    retry::ConflictRetry,
    wallet::credit_pack_purchase,
};

pub fn compensation_refund_key(payment_id: &str) -> String {
    format!("compensate-{payment_id}")
}

/// Repositories the gate reads and writes.
pub struct PaymentEventRepositories<B, W, U, C, CP, PE> {
    pub bookings: Arc<B>,
    pub wallet: Arc<W>,
    pub users: Arc<U>,
    pub courts: Arc<C>,
    pub credit_packs: Arc<CP>,
    pub payment_events: Arc<PE>,
}

pub struct PaymentEventUseCase<B, W, U, C, CP, PE, G, N>
where
    B: BookingRepository + Send + Sync + 'static,
    W: WalletRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    C: CourtRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    PE: PaymentEventRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    repos: PaymentEventRepositories<B, W, U, C, CP, PE>,
    gateway: Arc<G>,
    notifier: Arc<N>,
    reserver: SlotReserver<B>,
    processed_cache: Arc<ProcessedEventCache>,
    retry: ConflictRetry,
}

impl<B, W, U, C, CP, PE, G, N> PaymentEventUseCase<B, W, U, C, CP, PE, G, N>
where
    B: BookingRepository + Send + Sync + 'static,
    W: WalletRepository + Send + Sync + 'static,
    U: UserRepository + Send + Sync + 'static,
    C: CourtRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    PE: PaymentEventRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    pub fn new(
        repos: PaymentEventRepositories<B, W, U, C, CP, PE>,
        gateway: Arc<G>,
        notifier: Arc<N>,
        reserver: SlotReserver<B>,
        processed_cache: Arc<ProcessedEventCache>,
        retry: ConflictRetry,
    ) -> Self {
        Self {
            repos,
            gateway,
            notifier,
            reserver,
            processed_cache,
            retry,
        }
    }

    /// Verifies, deduplicates and settles one gateway event. Any `Ok` is an
    /// acknowledgement; errors make the sender redeliver.
    pub async fn handle_stripe_webhook(
        &self,
        payload: &[u8],
        signature: &str,
        now: DateTime<Utc>,
    ) -> UseCaseResult<WebhookAck> {
        let event = self
            .gateway
            .verify_event(payload, signature, now)
            .map_err(|err| {
                warn!(verify_error = ?err, "payment_events: rejected unverifiable event");
                BookingError::Validation("invalid webhook signature".to_string())
            })?;

        let event_id = event.id.clone();

        if self.processed_cache.contains_at(&event_id, now) {
            info!(%event_id, "payment_events: duplicate event (cache)");
            return Ok(ack(PaymentEventOutcome::DuplicateEvent));
        }

        let processed = self
            .repos
            .payment_events
            .is_processed(event_id.clone())
            .await
            .map_err(|err| {
                error!(%event_id, db_error = ?err, "payment_events: dedup lookup failed");
                BookingError::Internal(err)
            })?;
        if processed {
            self.processed_cache.insert_at(&event_id, now);
            info!(%event_id, "payment_events: duplicate event (store)");
            return Ok(ack(PaymentEventOutcome::DuplicateEvent));
        }

        let outcome = if event.type_ != PAYMENT_INTENT_SUCCEEDED {
            info!(%event_id, event_type = %event.type_, "payment_events: ignoring event type");
            PaymentEventOutcome::Ignored
        } else {
            match StripeClient::extract_payment_intent(&event) {
                Some(intent) => self.settle_payment(&intent, now).await?,
                None => {
                    error!(%event_id, "payment_events: payment intent object could not be parsed");
                    PaymentEventOutcome::Ignored
                }
            }
        };

        self.record_processed(&event_id, &event.type_, outcome, now).await?;

        info!(%event_id, outcome = outcome.as_str(), "payment_events: event settled");
        Ok(ack(outcome))
    }

    async fn record_processed(
        &self,
        event_id: &str,
        event_type: &str,
        outcome: PaymentEventOutcome,
        now: DateTime<Utc>,
    ) -> UseCaseResult<()> {
        let inserted = self
            .repos
            .payment_events
            .mark_processed(InsertProcessedPaymentEventEntity {
                event_id: event_id.to_string(),
                event_type: event_type.to_string(),
                outcome: outcome.as_str().to_string(),
            })
            .await
            .map_err(|err| {
                error!(%event_id, db_error = ?err, "payment_events: failed to record event");
                BookingError::Internal(err)
            })?;

        if !inserted {
            info!(%event_id, "payment_events: event recorded by a concurrent delivery");
        }
        self.processed_cache.insert_at(event_id, now);
        Ok(())
    }

    async fn settle_payment(
        &self,
        intent: &StripePaymentIntent,
        now: DateTime<Utc>,
    ) -> UseCaseResult<PaymentEventOutcome> {
        let payment_id = intent.id.clone();

        let metadata = match ChargeMetadata::from_metadata(&intent.metadata) {
            Ok(metadata) => metadata,
            Err(err) => {
                warn!(%payment_id, metadata_error = %err, "payment_events: unusable charge metadata");
                return self
                    .compensate(&payment_id, RefundReason::InvalidReference, None)
                    .await;
            }
        };

        if self.payment_already_recorded(&payment_id).await? {
            info!(%payment_id, "payment_events: payment already recorded");
            return Ok(PaymentEventOutcome::DuplicatePayment);
        }

        let user_id = metadata.user_id();
        let user_exists = self
            .repos
            .users
            .exists(user_id)
            .await
            .map_err(BookingError::Internal)?;
        if !user_exists {
            warn!(%payment_id, %user_id, "payment_events: unknown user");
            return self
                .compensate(&payment_id, RefundReason::InvalidReference, Some(user_id))
                .await;
        }

        match metadata {
            ChargeMetadata::Booking {
                user_id,
                court_id,
                range,
            } => {
                self.settle_booking_payment(intent, user_id, court_id, range)
                    .await
            }
            ChargeMetadata::CreditPack {
                user_id,
                credit_pack_id,
            } => {
                self.settle_credit_pack_payment(intent, user_id, credit_pack_id, now)
                    .await
            }
        }
    }

    async fn settle_booking_payment(
        &self,
        intent: &StripePaymentIntent,
        user_id: Uuid,
        court_id: Uuid,
        range: TimeRange,
    ) -> UseCaseResult<PaymentEventOutcome> {
        let payment_id = intent.id.clone();

        let Some(court) = self
            .repos
            .courts
            .find_active_by_id(court_id)
            .await
            .map_err(BookingError::Internal)?
        else {
            warn!(%payment_id, %court_id, "payment_events: court missing or inactive");
            return self
                .compensate(&payment_id, RefundReason::InvalidReference, Some(user_id))
                .await;
        };

        if intent.paid_amount() != court.price_cents {
            warn!(
                %payment_id,
                %court_id,
                paid_cents = intent.paid_amount(),
                price_cents = court.price_cents,
                "payment_events: paid amount does not match court price"
            );
            return self
                .compensate(&payment_id, RefundReason::AmountMismatch, Some(user_id))
                .await;
        }

        let booking = NewPaidBooking {
            booking_id: Uuid::new_v4(),
            user_id,
            court_id,
            range,
            price_cents: court.price_cents,
            payment_type: PaymentType::Online,
            external_payment_id: Some(payment_id.clone()),
        };

        let outcome = self.reserver.reserve(booking).await.map_err(|err| {
            error!(%payment_id, db_error = ?err, "payment_events: booking creation failed");
            BookingError::from_storage(err)
        })?;

        match outcome {
            PaidBookingOutcome::Created(created) => {
                info!(
                    %payment_id,
                    booking_id = %created.id,
                    %court_id,
                    "payment_events: online booking created"
                );
                let notification = BookingNotification::BookingConfirmed {
                    booking_id: created.id,
                    user_id: created.user_id,
                    court_id: created.court_id,
                    start_at: created.start_at,
                    end_at: created.end_at,
                    price_cents: created.price_cents,
                    payment_type: created.payment_type.clone(),
                };
                self.notify(notification).await;
                Ok(PaymentEventOutcome::BookingCreated)
            }
            PaidBookingOutcome::AlreadyRecorded(booking_id) => {
                info!(%payment_id, %booking_id, "payment_events: booking already holds this payment");
                Ok(PaymentEventOutcome::DuplicatePayment)
            }
            PaidBookingOutcome::SlotTaken => {
                warn!(%payment_id, %court_id, start_at = %range.start_at, "payment_events: slot taken before payment settled");
                self.compensate(&payment_id, RefundReason::SlotConflict, Some(user_id))
                    .await
            }
        }
    }

    async fn settle_credit_pack_payment(
        &self,
        intent: &StripePaymentIntent,
        user_id: Uuid,
        credit_pack_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<PaymentEventOutcome> {
        let payment_id = intent.id.clone();

        let Some(pack) = self
            .repos
            .credit_packs
            .find_active_by_id(credit_pack_id)
            .await
            .map_err(BookingError::Internal)?
        else {
            warn!(%payment_id, %credit_pack_id, "payment_events: credit pack missing or inactive");
            return self
                .compensate(&payment_id, RefundReason::InvalidReference, Some(user_id))
                .await;
        };

        if intent.paid_amount() != pack.price_cents {
            warn!(
                %payment_id,
                %credit_pack_id,
                paid_cents = intent.paid_amount(),
                price_cents = pack.price_cents,
                "payment_events: paid amount does not match pack price"
            );
            return self
                .compensate(&payment_id, RefundReason::AmountMismatch, Some(user_id))
                .await;
        }

        let purchase = credit_pack_purchase(&pack, user_id, payment_id.clone(), now);
        let recorded = self
            .retry
            .run("credit pack purchase", || {
                let repo = Arc::clone(&self.repos.wallet);
                let purchase = purchase.clone();
                async move { repo.record_transaction(purchase).await }
            })
            .await;

        match recorded {
            Ok(row) => {
                info!(
                    %payment_id,
                    %user_id,
                    transaction_id = %row.id,
                    credits_cents = row.amount_cents,
                    "payment_events: credits purchased"
                );
                Ok(PaymentEventOutcome::CreditsPurchased)
            }
            Err(err) if err.is::<DuplicateRecord>() => {
                info!(%payment_id, "payment_events: purchase already recorded");
                Ok(PaymentEventOutcome::DuplicatePayment)
            }
            Err(err) => {
                error!(%payment_id, db_error = ?err, "payment_events: purchase failed");
                Err(BookingError::from_storage(err))
            }
        }
    }

    async fn payment_already_recorded(&self, payment_id: &str) -> UseCaseResult<bool> {
        let booking = self
            .repos
            .bookings
            .find_by_external_payment_id(payment_id.to_string())
            .await
            .map_err(BookingError::Internal)?;
        if booking.is_some() {
            return Ok(true);
        }

        let wallet_row = self
            .repos
            .wallet
            .find_by_external_payment_id(payment_id.to_string())
            .await
            .map_err(BookingError::Internal)?;
        Ok(wallet_row.is_some())
    }

    /// Refunds a payment that cannot be honoured. A failed refund is returned
    /// as an error so the event is redelivered; the idempotency key keeps
    /// redeliveries from refunding twice.
    async fn compensate(
        &self,
        payment_id: &str,
        reason: RefundReason,
        user_id: Option<Uuid>,
    ) -> UseCaseResult<PaymentEventOutcome> {
        let outcome = self
            .gateway
            .refund_payment(
                payment_id.to_string(),
                reason,
                compensation_refund_key(payment_id),
            )
            .await
            .map_err(|err| {
                error!(%payment_id, reason = reason.tag(), gateway_error = ?err, "payment_events: compensating refund failed");
                BookingError::ExternalService(format!("compensating refund for {payment_id} failed"))
            })?;

        match outcome {
            RefundOutcome::Refunded { refund_id } => {
                info!(%payment_id, %refund_id, reason = reason.tag(), "payment_events: compensating refund issued");
            }
            RefundOutcome::AlreadyRefunded => {
                info!(%payment_id, reason = reason.tag(), "payment_events: payment was already refunded");
            }
        }

        self.notify(BookingNotification::PaymentRefunded {
            user_id,
            payment_id: payment_id.to_string(),
            reason,
        })
        .await;

        Ok(match reason {
            RefundReason::AmountMismatch => PaymentEventOutcome::RefundedAmountMismatch,
            RefundReason::SlotConflict => PaymentEventOutcome::RefundedSlotConflict,
            RefundReason::InvalidReference | RefundReason::CustomerCancellation => {
                PaymentEventOutcome::RefundedInvalidReference
            }
        })
    }

    async fn notify(&self, notification: BookingNotification) {
        let kind = notification.kind();
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(kind, notify_error = ?err, "payment_events: notification failed");
        }
    }
}

fn ack(outcome: PaymentEventOutcome) -> WebhookAck {
    WebhookAck {
        received: true,
        outcome,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crates::{
        domain::{
            entities::{
                bookings::BookingEntity, courts::CourtEntity, credit_packs::CreditPackEntity,
                wallet_transactions::WalletTransactionEntity,
            },
            repositories::{
                bookings::MockBookingRepository, courts::MockCourtRepository,
                credit_packs::MockCreditPackRepository, notifications::MockBookingNotifier,
                payment_events::MockPaymentEventRepository, users::MockUserRepository,
                wallet::MockWalletRepository,
            },
        },
        infra::cache::processed_events::ProcessedEventCacheOptions,
        payments::stripe_client::{StripeEvent, StripeEventData},
    };
    use std::{
        collections::HashMap,
        sync::{
            Mutex,
            atomic::{AtomicUsize, Ordering},
        },
    };

    use crate::usecases::{payment_gateway::MockPaymentGateway, reservations::ReservationStrategy};

    type Gate = PaymentEventUseCase<
        MockBookingRepository,
        MockWalletRepository,
        MockUserRepository,
        MockCourtRepository,
        MockCreditPackRepository,
        MockPaymentEventRepository,
        MockPaymentGateway,
        MockBookingNotifier,
    >;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, 10, 0, 0).unwrap()
    }

    fn court_id() -> Uuid {
        Uuid::from_u128(0x42)
    }

    fn slot() -> TimeRange {
        let start_at = Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap();
        TimeRange::new(start_at, start_at + Duration::minutes(90)).unwrap()
    }

    fn court() -> CourtEntity {
        CourtEntity {
            id: court_id(),
            name: "Court 1".to_string(),
            duration_minutes: 90,
            price_cents: 6000,
            capacity: 4,
            location: "indoor".to_string(),
            is_active: true,
            created_at: now(),
        }
    }

    fn booking_event(user_id: Uuid, amount: i64) -> StripeEvent {
        let metadata = ChargeMetadata::Booking {
            user_id,
            court_id: court_id(),
            range: slot(),
        }
        .to_metadata();
        intent_event(amount, metadata)
    }

    fn intent_event(amount: i64, metadata: HashMap<String, String>) -> StripeEvent {
        StripeEvent {
            id: "evt_1".to_string(),
            type_: PAYMENT_INTENT_SUCCEEDED.to_string(),
            created: None,
            livemode: Some(false),
            data: StripeEventData {
                object: serde_json::json!({
                    "id": "pi_1",
                    "amount": amount,
                    "amount_received": amount,
                    "currency": "eur",
                    "metadata": metadata,
                }),
            },
        }
    }

    /// In-memory record of processed events shared across mock calls.
    fn payment_event_store(processed: Arc<Mutex<Vec<String>>>) -> MockPaymentEventRepository {
        let mut repo = MockPaymentEventRepository::new();
        let seen = Arc::clone(&processed);
        repo.expect_is_processed().returning(move |event_id| {
            let found = seen.lock().unwrap().contains(&event_id);
            Box::pin(async move { Ok(found) })
        });
        repo.expect_mark_processed().returning(move |event| {
            let mut store = processed.lock().unwrap();
            let inserted = !store.contains(&event.event_id);
            if inserted {
                store.push(event.event_id);
            }
            Box::pin(async move { Ok(inserted) })
        });
        repo
    }

    fn users_exist() -> MockUserRepository {
        let mut users = MockUserRepository::new();
        users
            .expect_exists()
            .returning(|_| Box::pin(async move { Ok(true) }));
        users
    }

    fn courts_with_court() -> MockCourtRepository {
        let mut courts = MockCourtRepository::new();
        courts
            .expect_find_active_by_id()
            .returning(|_| Box::pin(async move { Ok(Some(court())) }));
        courts
    }

    fn wallet_without_payment() -> MockWalletRepository {
        let mut wallet = MockWalletRepository::new();
        wallet
            .expect_find_by_external_payment_id()
            .returning(|_| Box::pin(async move { Ok(None) }));
        wallet
    }

    fn quiet_notifier() -> MockBookingNotifier {
        let mut notifier = MockBookingNotifier::new();
        notifier
            .expect_notify()
            .returning(|_| Box::pin(async move { Ok(()) }));
        notifier
    }

    fn gate(
        bookings: MockBookingRepository,
        wallet: MockWalletRepository,
        courts: MockCourtRepository,
        credit_packs: MockCreditPackRepository,
        payment_events: MockPaymentEventRepository,
        gateway: MockPaymentGateway,
    ) -> Gate {
        let bookings = Arc::new(bookings);
        let reserver = SlotReserver::new(
            Arc::clone(&bookings),
            ReservationStrategy::Serializable,
            ConflictRetry::new(3, 1, 2),
        );
        PaymentEventUseCase::new(
            PaymentEventRepositories {
                bookings,
                wallet: Arc::new(wallet),
                users: Arc::new(users_exist()),
                courts: Arc::new(courts),
                credit_packs: Arc::new(credit_packs),
                payment_events: Arc::new(payment_events),
            },
            Arc::new(gateway),
            Arc::new(quiet_notifier()),
            reserver,
            Arc::new(ProcessedEventCache::new(ProcessedEventCacheOptions::default())),
            ConflictRetry::new(3, 1, 2),
        )
    }

    fn created_booking(request: &NewPaidBooking) -> BookingEntity {
        BookingEntity {
            id: request.booking_id,
            user_id: request.user_id,
            court_id: request.court_id,
            start_at: request.range.start_at,
            end_at: request.range.end_at,
            price_cents: request.price_cents,
            payment_type: "online".to_string(),
            status: "confirmed".to_string(),
            external_payment_id: request.external_payment_id.clone(),
            credit_transaction_id: None,
            reminder_sent: false,
            created_at: now(),
            updated_at: now(),
        }
    }

    #[tokio::test]
    async fn replayed_event_creates_one_booking() {
        let user_id = Uuid::new_v4();
        let processed = Arc::new(Mutex::new(Vec::new()));

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_find_by_external_payment_id()
            .returning(|_| Box::pin(async move { Ok(None) }));
        bookings
            .expect_create_confirmed_paid_booking()
            .times(1)
            .returning(|request| {
                assert_eq!(request.payment_type, PaymentType::Online);
                assert_eq!(request.external_payment_id.as_deref(), Some("pi_1"));
                let created = created_booking(&request);
                Box::pin(async move { Ok(PaidBookingOutcome::Created(created)) })
            });

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_event()
            .returning(move |_, _, _| Ok(booking_event(user_id, 6000)));
        gateway.expect_refund_payment().never();

        let gate = gate(
            bookings,
            wallet_without_payment(),
            courts_with_court(),
            MockCreditPackRepository::new(),
            payment_event_store(processed),
            gateway,
        );

        let first = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();
        let second = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();

        assert_eq!(first.outcome, PaymentEventOutcome::BookingCreated);
        assert_eq!(second.outcome, PaymentEventOutcome::DuplicateEvent);
    }

    #[tokio::test]
    async fn amount_mismatch_refunds_as_suspected_fraud() {
        let user_id = Uuid::new_v4();

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_find_by_external_payment_id()
            .returning(|_| Box::pin(async move { Ok(None) }));
        bookings.expect_create_confirmed_paid_booking().never();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_event()
            .returning(move |_, _, _| Ok(booking_event(user_id, 5000)));
        gateway
            .expect_refund_payment()
            .times(1)
            .returning(|payment_id, reason, key| {
                assert_eq!(payment_id, "pi_1");
                assert_eq!(reason, RefundReason::AmountMismatch);
                assert_eq!(reason.tag(), "suspected_fraud");
                assert_eq!(key, "compensate-pi_1");
                Ok(RefundOutcome::Refunded {
                    refund_id: "re_1".to_string(),
                })
            });

        let gate = gate(
            bookings,
            wallet_without_payment(),
            courts_with_court(),
            MockCreditPackRepository::new(),
            payment_event_store(Arc::new(Mutex::new(Vec::new()))),
            gateway,
        );

        let ack = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();
        assert!(ack.received);
        assert_eq!(ack.outcome, PaymentEventOutcome::RefundedAmountMismatch);
    }

    #[tokio::test]
    async fn slot_conflict_refunds_as_duplicate() {
        let user_id = Uuid::new_v4();

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_find_by_external_payment_id()
            .returning(|_| Box::pin(async move { Ok(None) }));
        bookings
            .expect_create_confirmed_paid_booking()
            .returning(|_| Box::pin(async move { Ok(PaidBookingOutcome::SlotTaken) }));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_event()
            .returning(move |_, _, _| Ok(booking_event(user_id, 6000)));
        gateway
            .expect_refund_payment()
            .times(1)
            .returning(|_, reason, _| {
                assert_eq!(reason.tag(), "duplicate");
                Ok(RefundOutcome::AlreadyRefunded)
            });

        let gate = gate(
            bookings,
            wallet_without_payment(),
            courts_with_court(),
            MockCreditPackRepository::new(),
            payment_event_store(Arc::new(Mutex::new(Vec::new()))),
            gateway,
        );

        let ack = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();
        assert_eq!(ack.outcome, PaymentEventOutcome::RefundedSlotConflict);
    }

    #[tokio::test]
    async fn failed_compensation_is_redelivered_without_double_refund() {
        let user_id = Uuid::new_v4();
        let processed = Arc::new(Mutex::new(Vec::new()));
        let refund_calls = Arc::new(AtomicUsize::new(0));

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_find_by_external_payment_id()
            .returning(|_| Box::pin(async move { Ok(None) }));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_event()
            .returning(move |_, _, _| Ok(booking_event(user_id, 1)));
        let calls = Arc::clone(&refund_calls);
        gateway.expect_refund_payment().returning(move |_, _, key| {
            assert_eq!(key, "compensate-pi_1");
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(anyhow::anyhow!("gateway timeout"))
            } else {
                Ok(RefundOutcome::Refunded {
                    refund_id: "re_1".to_string(),
                })
            }
        });

        let gate = gate(
            bookings,
            wallet_without_payment(),
            courts_with_court(),
            MockCreditPackRepository::new(),
            payment_event_store(Arc::clone(&processed)),
            gateway,
        );

        let first = gate.handle_stripe_webhook(b"{}", "sig", now()).await;
        assert!(matches!(first, Err(BookingError::ExternalService(_))));
        assert!(processed.lock().unwrap().is_empty());

        let second = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();
        assert_eq!(second.outcome, PaymentEventOutcome::RefundedAmountMismatch);
        assert_eq!(refund_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn unverifiable_event_is_rejected() {
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_event()
            .returning(|_, _, _| Err(anyhow::anyhow!("invalid webhook signature")));

        let gate = gate(
            MockBookingRepository::new(),
            MockWalletRepository::new(),
            MockCourtRepository::new(),
            MockCreditPackRepository::new(),
            MockPaymentEventRepository::new(),
            gateway,
        );

        let result = gate.handle_stripe_webhook(b"{}", "bad", now()).await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn payment_already_on_a_booking_is_acknowledged() {
        let user_id = Uuid::new_v4();

        let mut bookings = MockBookingRepository::new();
        bookings.expect_find_by_external_payment_id().returning(move |payment_id| {
            let existing = created_booking(&NewPaidBooking {
                booking_id: Uuid::new_v4(),
                user_id,
                court_id: court_id(),
                range: slot(),
                price_cents: 6000,
                payment_type: PaymentType::Online,
                external_payment_id: Some(payment_id),
            });
            Box::pin(async move { Ok(Some(existing)) })
        });
        bookings.expect_create_confirmed_paid_booking().never();

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_event()
            .returning(move |_, _, _| Ok(booking_event(user_id, 6000)));
        gateway.expect_refund_payment().never();

        let gate = gate(
            bookings,
            MockWalletRepository::new(),
            courts_with_court(),
            MockCreditPackRepository::new(),
            payment_event_store(Arc::new(Mutex::new(Vec::new()))),
            gateway,
        );

        let ack = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();
        assert_eq!(ack.outcome, PaymentEventOutcome::DuplicatePayment);
    }

    #[tokio::test]
    async fn credit_pack_payment_grants_credits() {
        let user_id = Uuid::new_v4();
        let pack_id = Uuid::from_u128(7);

        let mut bookings = MockBookingRepository::new();
        bookings
            .expect_find_by_external_payment_id()
            .returning(|_| Box::pin(async move { Ok(None) }));

        let mut wallet = wallet_without_payment();
        wallet
            .expect_record_transaction()
            .times(1)
            .returning(move |purchase| {
                assert_eq!(purchase.amount_cents, 16000);
                assert_eq!(purchase.credit_pack_id, Some(pack_id));
                assert!(purchase.expires_at.is_some());
                let row = WalletTransactionEntity {
                    id: Uuid::new_v4(),
                    user_id: purchase.user_id,
                    type_: "purchase".to_string(),
                    amount_cents: purchase.amount_cents,
                    balance_after_cents: purchase.amount_cents,
                    booking_id: None,
                    credit_pack_id: purchase.credit_pack_id,
                    expires_at: purchase.expires_at,
                    external_payment_id: purchase.external_payment_id.clone(),
                    created_at: now(),
                };
                Box::pin(async move { Ok(row) })
            });

        let mut packs = MockCreditPackRepository::new();
        packs.expect_find_active_by_id().returning(move |_| {
            let pack = CreditPackEntity {
                id: pack_id,
                name: "Pack 150".to_string(),
                price_cents: 15000,
                credits_cents: 16000,
                validity_months: 6,
                is_active: true,
                created_at: now(),
            };
            Box::pin(async move { Ok(Some(pack)) })
        });

        let metadata = ChargeMetadata::CreditPack {
            user_id,
            credit_pack_id: pack_id,
        }
        .to_metadata();
        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_verify_event()
            .returning(move |_, _, _| Ok(intent_event(15000, metadata.clone())));
        gateway.expect_refund_payment().never();

        let gate = gate(
            bookings,
            wallet,
            MockCourtRepository::new(),
            packs,
            payment_event_store(Arc::new(Mutex::new(Vec::new()))),
            gateway,
        );

        let ack = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();
        assert_eq!(ack.outcome, PaymentEventOutcome::CreditsPurchased);
    }

    #[tokio::test]
    async fn other_event_types_are_acknowledged_and_ignored() {
        let mut gateway = MockPaymentGateway::new();
        gateway.expect_verify_event().returning(|_, _, _| {
            let mut event = intent_event(6000, HashMap::new());
            event.type_ = "charge.refunded".to_string();
            Ok(event)
        });

        let gate = gate(
            MockBookingRepository::new(),
            MockWalletRepository::new(),
            MockCourtRepository::new(),
            MockCreditPackRepository::new(),
            payment_event_store(Arc::new(Mutex::new(Vec::new()))),
            gateway,
        );

        let ack = gate.handle_stripe_webhook(b"{}", "sig", now()).await.unwrap();
        assert_eq!(ack.outcome, PaymentEventOutcome::Ignored);
    }
}
