use std::sync::Arc;

use chrono::{DateTime, Utc};
use crates::{
    domain::{
        entities::bookings::BookingEntity,
        repositories::{
            bookings::BookingRepository, notifications::BookingNotifier, wallet::WalletRepository,
        },
        value_objects::{
            booking_policy::BookingPolicy,
            bookings::{CancellationReceipt, RefundMethod},
            enums::{
                booking_statuses::BookingStatus, payment_types::PaymentType,
                refund_reasons::RefundReason, wallet_transaction_types::WalletTransactionType,
            },
            notifications::BookingNotification,
            storage_errors::DuplicateRecord,
            wallet::NewWalletTransaction,
        },
    },
    payments::stripe_client::RefundOutcome,
};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::usecases::{
    errors::{BookingError, UseCaseResult},
    payment_gateway::PaymentGateway,
    retry::ConflictRetry,
};

pub fn cancellation_refund_key(booking_id: Uuid) -> String {
    format!("booking-refund-{booking_id}")
}

/// The ledger splits this over the booking's payment rows, copying their expiry.
fn wallet_refund(booking: &BookingEntity, as_of: DateTime<Utc>) -> NewWalletTransaction {
    NewWalletTransaction {
        user_id: booking.user_id,
        transaction_type: WalletTransactionType::Refund,
        amount_cents: booking.price_cents,
        expires_at: None,
        booking_id: Some(booking.id),
        credit_pack_id: None,
        external_payment_id: None,
        as_of,
    }
}

pub struct CancellationUseCase<B, W, G, N>
where
    B: BookingRepository + Send + Sync + 'static,
    W: WalletRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    booking_repo: Arc<B>,
    wallet_repo: Arc<W>,
    gateway: Arc<G>,
    notifier: Arc<N>,
    policy: BookingPolicy,
    retry: ConflictRetry,
}

impl<B, W, G, N> CancellationUseCase<B, W, G, N>
where
    B: BookingRepository + Send + Sync + 'static,
    W: WalletRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
    N: BookingNotifier + Send + Sync + 'static,
{
    pub fn new(
        booking_repo: Arc<B>,
        wallet_repo: Arc<W>,
        gateway: Arc<G>,
        notifier: Arc<N>,
        policy: BookingPolicy,
        retry: ConflictRetry,
    ) -> Self {
        Self {
            booking_repo,
            wallet_repo,
            gateway,
            notifier,
            policy,
            retry,
        }
    }

    pub async fn cancel_booking(
        &self,
        user_id: Uuid,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<CancellationReceipt> {
        let booking = self.load_booking(booking_id).await?;

        if booking.user_id != user_id {
            warn!(%user_id, %booking_id, "cancellations: user does not own booking");
            return Err(BookingError::Authorization(
                "booking belongs to another user".to_string(),
            ));
        }

        match booking.status() {
            Some(BookingStatus::Confirmed) => {}
            Some(BookingStatus::Cancelled) => {
                return Err(BookingError::AlreadyProcessed(format!(
                    "booking {booking_id} is already cancelled"
                )));
            }
            _ => {
                return Err(BookingError::Validation(format!(
                    "booking {booking_id} is {} and cannot be cancelled",
                    booking.status
                )));
            }
        }

        if !self.policy.can_cancel(booking.start_at, now) {
            info!(
                %booking_id,
                start_at = %booking.start_at,
                deadline = %self.policy.cancellation_deadline(booking.start_at),
                "cancellations: cutoff passed"
            );
            return Err(BookingError::Validation(format!(
                "bookings can only be cancelled more than {} hours before start",
                self.policy.cancellation_cutoff_hours
            )));
        }

        let payment_type = booking.payment_type().ok_or_else(|| {
            BookingError::Internal(anyhow::anyhow!(
                "booking {booking_id} has unknown payment type {}",
                booking.payment_type
            ))
        })?;

        let receipt = match payment_type {
            PaymentType::Credit => {
                let refund = wallet_refund(&booking, now);
                let cancelled = self
                    .retry
                    .run("cancel with wallet refund", || {
                        let repo = Arc::clone(&self.booking_repo);
                        let refund = refund.clone();
                        async move { repo.cancel_with_wallet_refund(booking_id, refund).await }
                    })
                    .await
                    .map_err(|err| {
                        error!(%booking_id, db_error = ?err, "cancellations: wallet refund failed");
                        BookingError::from_storage(err)
                    })?;
                if !cancelled {
                    return Err(already_processed(booking_id));
                }
                CancellationReceipt {
                    booking_id,
                    refund_method: RefundMethod::Wallet,
                    refunded_cents: booking.price_cents,
                }
            }
            PaymentType::Online => {
                self.cancel_status(booking_id).await?;
                let receipt = CancellationReceipt {
                    booking_id,
                    refund_method: RefundMethod::Gateway,
                    refunded_cents: booking.price_cents,
                };
                // The cancellation stands even if the gateway refund fails; it is retried later.
                if let Err(err) = self.refund_through_gateway(&booking).await {
                    self.notify_cancelled(&booking, &receipt).await;
                    return Err(err);
                }
                receipt
            }
            PaymentType::Free => {
                self.cancel_status(booking_id).await?;
                CancellationReceipt {
                    booking_id,
                    refund_method: RefundMethod::None,
                    refunded_cents: 0,
                }
            }
        };

        info!(
            %user_id,
            %booking_id,
            refund_method = ?receipt.refund_method,
            refunded_cents = receipt.refunded_cents,
            "cancellations: booking cancelled"
        );
        self.notify_cancelled(&booking, &receipt).await;

        Ok(receipt)
    }

    /// Re-runs refund settlement for a cancelled booking. Safe to repeat.
    pub async fn retry_refund(
        &self,
        booking_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<CancellationReceipt> {
        let booking = self.load_booking(booking_id).await?;

        if booking.status() != Some(BookingStatus::Cancelled) {
            return Err(BookingError::Validation(format!(
                "booking {booking_id} is {}, only cancelled bookings are refunded",
                booking.status
            )));
        }

        match booking.payment_type() {
            Some(PaymentType::Credit) => {
                self.settle_wallet_refund(&booking, now).await?;
                Ok(CancellationReceipt {
                    booking_id,
                    refund_method: RefundMethod::Wallet,
                    refunded_cents: booking.price_cents,
                })
            }
            Some(PaymentType::Online) => {
                self.refund_through_gateway(&booking).await?;
                Ok(CancellationReceipt {
                    booking_id,
                    refund_method: RefundMethod::Gateway,
                    refunded_cents: booking.price_cents,
                })
            }
            Some(PaymentType::Free) => Ok(CancellationReceipt {
                booking_id,
                refund_method: RefundMethod::None,
                refunded_cents: 0,
            }),
            None => Err(BookingError::Internal(anyhow::anyhow!(
                "booking {booking_id} has unknown payment type {}",
                booking.payment_type
            ))),
        }
    }

    async fn load_booking(&self, booking_id: Uuid) -> UseCaseResult<BookingEntity> {
        self.booking_repo
            .find_by_id(booking_id)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "cancellations: failed to load booking");
                BookingError::Internal(err)
            })?
            .ok_or_else(|| BookingError::NotFound(format!("booking {booking_id}")))
    }

    async fn cancel_status(&self, booking_id: Uuid) -> UseCaseResult<()> {
        let cancelled = self
            .booking_repo
            .cancel_if_confirmed(booking_id)
            .await
            .map_err(|err| {
                error!(%booking_id, db_error = ?err, "cancellations: status update failed");
                BookingError::Internal(err)
            })?;

        if !cancelled {
            return Err(already_processed(booking_id));
        }
        Ok(())
    }

    async fn settle_wallet_refund(
        &self,
        booking: &BookingEntity,
        now: DateTime<Utc>,
    ) -> UseCaseResult<()> {
        let existing = self
            .wallet_repo
            .find_refund_for_booking(booking.id)
            .await
            .map_err(BookingError::Internal)?;
        if existing.is_some() {
            info!(booking_id = %booking.id, "cancellations: wallet refund already recorded");
            return Ok(());
        }

        let refund = wallet_refund(booking, now);
        let recorded = self
            .retry
            .run("wallet refund", || {
                let repo = Arc::clone(&self.wallet_repo);
                let refund = refund.clone();
                async move { repo.record_transaction(refund).await }
            })
            .await;

        match recorded {
            Ok(row) => {
                info!(booking_id = %booking.id, transaction_id = %row.id, "cancellations: wallet refund recorded");
                Ok(())
            }
            Err(err) if err.is::<DuplicateRecord>() => {
                info!(booking_id = %booking.id, "cancellations: concurrent wallet refund already recorded");
                Ok(())
            }
            Err(err) => {
                error!(booking_id = %booking.id, db_error = ?err, "cancellations: wallet refund failed");
                Err(BookingError::from_storage(err))
            }
        }
    }

    async fn refund_through_gateway(&self, booking: &BookingEntity) -> UseCaseResult<()> {
        let Some(payment_id) = booking.external_payment_id.clone() else {
            error!(booking_id = %booking.id, "cancellations: online booking has no payment reference");
            return Err(BookingError::Internal(anyhow::anyhow!(
                "online booking {} has no external payment id",
                booking.id
            )));
        };

        let outcome = self
            .gateway
            .refund_payment(
                payment_id.clone(),
                RefundReason::CustomerCancellation,
                cancellation_refund_key(booking.id),
            )
            .await
            .map_err(|err| {
                error!(
                    booking_id = %booking.id,
                    %payment_id,
                    gateway_error = ?err,
                    "cancellations: gateway refund failed"
                );
                BookingError::ExternalService(format!(
                    "refund for booking {} failed and can be retried",
                    booking.id
                ))
            })?;

        match outcome {
            RefundOutcome::Refunded { refund_id } => {
                info!(booking_id = %booking.id, %payment_id, %refund_id, "cancellations: gateway refund issued");
            }
            RefundOutcome::AlreadyRefunded => {
                info!(booking_id = %booking.id, %payment_id, "cancellations: payment was already refunded");
            }
        }
        Ok(())
    }

    async fn notify_cancelled(&self, booking: &BookingEntity, receipt: &CancellationReceipt) {
        let notification = BookingNotification::BookingCancelled {
            booking_id: booking.id,
            user_id: booking.user_id,
            start_at: booking.start_at,
            refund_method: receipt.refund_method,
            refunded_cents: receipt.refunded_cents,
        };
        if let Err(err) = self.notifier.notify(notification).await {
            warn!(booking_id = %booking.id, notify_error = ?err, "cancellations: notification failed");
        }
    }
}

fn already_processed(booking_id: Uuid) -> BookingError {
    BookingError::AlreadyProcessed(format!("booking {booking_id} is no longer confirmed"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use crates::domain::{
        entities::wallet_transactions::WalletTransactionEntity,
        repositories::{
            bookings::MockBookingRepository, notifications::MockBookingNotifier,
            wallet::MockWalletRepository,
        },
    };
    use mockall::predicate::eq;

    use crate::usecases::payment_gateway::MockPaymentGateway;

    fn start_at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap()
    }

    fn booking(user_id: Uuid, payment_type: &str, status: &str) -> BookingEntity {
        BookingEntity {
            id: Uuid::from_u128(99),
            user_id,
            court_id: Uuid::new_v4(),
            start_at: start_at(),
            end_at: start_at() + Duration::minutes(90),
            price_cents: 6000,
            payment_type: payment_type.to_string(),
            status: status.to_string(),
            external_payment_id: (payment_type == "online").then(|| "pi_1".to_string()),
            credit_transaction_id: None,
            reminder_sent: false,
            created_at: start_at() - Duration::days(3),
            updated_at: start_at() - Duration::days(3),
        }
    }

    fn bookings_returning(found: BookingEntity) -> MockBookingRepository {
        let mut repo = MockBookingRepository::new();
        repo.expect_find_by_id().returning(move |_| {
            let found = found.clone();
            Box::pin(async move { Ok(Some(found)) })
        });
        repo
    }

    fn quiet_notifier() -> MockBookingNotifier {
        let mut notifier = MockBookingNotifier::new();
        notifier
            .expect_notify()
            .returning(|_| Box::pin(async move { Ok(()) }));
        notifier
    }

    fn usecase(
        bookings: MockBookingRepository,
        wallet: MockWalletRepository,
        gateway: MockPaymentGateway,
        notifier: MockBookingNotifier,
    ) -> CancellationUseCase<MockBookingRepository, MockWalletRepository, MockPaymentGateway, MockBookingNotifier>
    {
        CancellationUseCase::new(
            Arc::new(bookings),
            Arc::new(wallet),
            Arc::new(gateway),
            Arc::new(notifier),
            BookingPolicy::default(),
            ConflictRetry::new(3, 1, 2),
        )
    }

    #[tokio::test]
    async fn credit_cancellation_refunds_the_price_once() {
        let user_id = Uuid::new_v4();
        let mut bookings = bookings_returning(booking(user_id, "credit", "confirmed"));
        bookings
            .expect_cancel_with_wallet_refund()
            .times(1)
            .returning(|booking_id, refund| {
                assert_eq!(booking_id, Uuid::from_u128(99));
                assert_eq!(refund.transaction_type, WalletTransactionType::Refund);
                assert_eq!(refund.amount_cents, 6000);
                assert_eq!(refund.booking_id, Some(booking_id));
                assert_eq!(refund.expires_at, None);
                Box::pin(async move { Ok(true) })
            });

        let usecase = usecase(
            bookings,
            MockWalletRepository::new(),
            MockPaymentGateway::new(),
            quiet_notifier(),
        );

        let now = start_at() - Duration::hours(25);
        let receipt = usecase
            .cancel_booking(user_id, Uuid::from_u128(99), now)
            .await
            .unwrap();

        assert_eq!(receipt.refund_method, RefundMethod::Wallet);
        assert_eq!(receipt.refunded_cents, 6000);
    }

    #[tokio::test]
    async fn cancellation_inside_cutoff_is_rejected() {
        let user_id = Uuid::new_v4();
        let mut bookings = bookings_returning(booking(user_id, "credit", "confirmed"));
        bookings.expect_cancel_with_wallet_refund().never();
        bookings.expect_cancel_if_confirmed().never();

        let usecase = usecase(
            bookings,
            MockWalletRepository::new(),
            MockPaymentGateway::new(),
            MockBookingNotifier::new(),
        );

        let now = start_at() - Duration::hours(23);
        let result = usecase.cancel_booking(user_id, Uuid::from_u128(99), now).await;
        assert!(matches!(result, Err(BookingError::Validation(_))));

        let exactly_at_cutoff = start_at() - Duration::hours(24);
        let result = usecase
            .cancel_booking(user_id, Uuid::from_u128(99), exactly_at_cutoff)
            .await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }

    #[tokio::test]
    async fn other_users_cannot_cancel() {
        let bookings = bookings_returning(booking(Uuid::new_v4(), "credit", "confirmed"));
        let usecase = usecase(
            bookings,
            MockWalletRepository::new(),
            MockPaymentGateway::new(),
            MockBookingNotifier::new(),
        );

        let result = usecase
            .cancel_booking(Uuid::new_v4(), Uuid::from_u128(99), start_at() - Duration::days(2))
            .await;
        assert!(matches!(result, Err(BookingError::Authorization(_))));
    }

    #[tokio::test]
    async fn losing_the_status_race_is_already_processed() {
        let user_id = Uuid::new_v4();
        let mut bookings = bookings_returning(booking(user_id, "credit", "confirmed"));
        bookings
            .expect_cancel_with_wallet_refund()
            .returning(|_, _| Box::pin(async move { Ok(false) }));

        let usecase = usecase(
            bookings,
            MockWalletRepository::new(),
            MockPaymentGateway::new(),
            MockBookingNotifier::new(),
        );

        let result = usecase
            .cancel_booking(user_id, Uuid::from_u128(99), start_at() - Duration::days(2))
            .await;
        assert!(matches!(result, Err(BookingError::AlreadyProcessed(_))));
    }

    #[tokio::test]
    async fn online_cancellation_refunds_through_gateway_with_stable_key() {
        let user_id = Uuid::new_v4();
        let mut bookings = bookings_returning(booking(user_id, "online", "confirmed"));
        bookings
            .expect_cancel_if_confirmed()
            .with(eq(Uuid::from_u128(99)))
            .times(1)
            .returning(|_| Box::pin(async move { Ok(true) }));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_refund_payment()
            .times(1)
            .returning(|payment_id, reason, key| {
                assert_eq!(payment_id, "pi_1");
                assert_eq!(reason, RefundReason::CustomerCancellation);
                assert_eq!(key, cancellation_refund_key(Uuid::from_u128(99)));
                Ok(RefundOutcome::AlreadyRefunded)
            });

        let usecase = usecase(bookings, MockWalletRepository::new(), gateway, quiet_notifier());

        let receipt = usecase
            .cancel_booking(user_id, Uuid::from_u128(99), start_at() - Duration::days(2))
            .await
            .unwrap();
        assert_eq!(receipt.refund_method, RefundMethod::Gateway);
    }

    #[tokio::test]
    async fn gateway_failure_keeps_the_cancellation() {
        let user_id = Uuid::new_v4();
        let mut bookings = bookings_returning(booking(user_id, "online", "confirmed"));
        bookings
            .expect_cancel_if_confirmed()
            .times(1)
            .returning(|_| Box::pin(async move { Ok(true) }));

        let mut gateway = MockPaymentGateway::new();
        gateway
            .expect_refund_payment()
            .returning(|_, _, _| Err(anyhow::anyhow!("gateway timeout")));

        let mut notifier = MockBookingNotifier::new();
        notifier
            .expect_notify()
            .times(1)
            .withf(|notification| {
                matches!(
                    notification,
                    BookingNotification::BookingCancelled {
                        refund_method: RefundMethod::Gateway,
                        refunded_cents: 6000,
                        ..
                    }
                )
            })
            .returning(|_| Box::pin(async move { Ok(()) }));

        let usecase = usecase(bookings, MockWalletRepository::new(), gateway, notifier);

        let result = usecase
            .cancel_booking(user_id, Uuid::from_u128(99), start_at() - Duration::days(2))
            .await;
        assert!(matches!(result, Err(BookingError::ExternalService(_))));
    }

    #[tokio::test]
    async fn retry_refund_does_not_duplicate_wallet_refunds() {
        let user_id = Uuid::new_v4();
        let cancelled = booking(user_id, "credit", "cancelled");
        let bookings = bookings_returning(cancelled.clone());

        let mut wallet = MockWalletRepository::new();
        wallet.expect_find_refund_for_booking().returning(move |booking_id| {
            let row = WalletTransactionEntity {
                id: Uuid::new_v4(),
                user_id,
                type_: "refund".to_string(),
                amount_cents: 6000,
                balance_after_cents: 6000,
                booking_id: Some(booking_id),
                credit_pack_id: None,
                expires_at: None,
                external_payment_id: None,
                created_at: Utc::now(),
            };
            Box::pin(async move { Ok(Some(row)) })
        });
        wallet.expect_record_transaction().never();

        let usecase = usecase(
            bookings,
            wallet,
            MockPaymentGateway::new(),
            MockBookingNotifier::new(),
        );

        let receipt = usecase.retry_refund(cancelled.id, Utc::now()).await.unwrap();
        assert_eq!(receipt.refunded_cents, 6000);
    }

    #[tokio::test]
    async fn retry_refund_records_missing_wallet_refund() {
        let user_id = Uuid::new_v4();
        let cancelled = booking(user_id, "credit", "cancelled");
        let bookings = bookings_returning(cancelled.clone());

        let mut wallet = MockWalletRepository::new();
        wallet
            .expect_find_refund_for_booking()
            .returning(|_| Box::pin(async move { Ok(None) }));
        wallet
            .expect_record_transaction()
            .times(1)
            .returning(move |refund| {
                assert_eq!(refund.amount_cents, 6000);
                let row = WalletTransactionEntity {
                    id: Uuid::new_v4(),
                    user_id: refund.user_id,
                    type_: "refund".to_string(),
                    amount_cents: refund.amount_cents,
                    balance_after_cents: refund.amount_cents,
                    booking_id: refund.booking_id,
                    credit_pack_id: None,
                    expires_at: None,
                    external_payment_id: None,
                    created_at: Utc::now(),
                };
                Box::pin(async move { Ok(row) })
            });

        let usecase = usecase(
            bookings,
            wallet,
            MockPaymentGateway::new(),
            MockBookingNotifier::new(),
        );

        assert!(usecase.retry_refund(cancelled.id, Utc::now()).await.is_ok());
    }

    #[tokio::test]
    async fn retry_refund_requires_a_cancelled_booking() {
        let confirmed = booking(Uuid::new_v4(), "online", "confirmed");
        let usecase = usecase(
            bookings_returning(confirmed.clone()),
            MockWalletRepository::new(),
            MockPaymentGateway::new(),
            MockBookingNotifier::new(),
        );

        let result = usecase.retry_refund(confirmed.id, Utc::now()).await;
        assert!(matches!(result, Err(BookingError::Validation(_))));
    }
}
