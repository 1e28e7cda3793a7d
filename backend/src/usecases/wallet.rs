use std::sync::Arc;

use chrono::{DateTime, Months, Utc};
use crates::domain::{
    entities::{credit_packs::CreditPackEntity, wallet_transactions::WalletTransactionEntity},
    repositories::{credit_packs::CreditPackRepository, wallet::WalletRepository},
    value_objects::{
        bookings::ChargeIntentDto,
        enums::wallet_transaction_types::WalletTransactionType,
        payment_events::ChargeMetadata,
        wallet::{NewWalletTransaction, NextExpiringCredits, WalletBalanceDto},
    },
};
use tracing::{error, info};
use uuid::Uuid;

use crate::usecases::{
    errors::{BookingError, UseCaseResult},
    payment_gateway::PaymentGateway,
};

/// Ledger row granting a pack's credits, expiring `validity_months` after `purchased_at`.
pub fn credit_pack_purchase(
    pack: &CreditPackEntity,
    user_id: Uuid,
    external_payment_id: String,
    purchased_at: DateTime<Utc>,
) -> NewWalletTransaction {
    let validity = Months::new(u32::try_from(pack.validity_months).unwrap_or(0));
    NewWalletTransaction {
        user_id,
        transaction_type: WalletTransactionType::Purchase,
        amount_cents: pack.credits_cents,
        expires_at: purchased_at.checked_add_months(validity),
        booking_id: None,
        credit_pack_id: Some(pack.id),
        external_payment_id: Some(external_payment_id),
        as_of: purchased_at,
    }
}

pub struct WalletUseCase<W, CP, G>
where
    W: WalletRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    wallet_repo: Arc<W>,
    credit_pack_repo: Arc<CP>,
    gateway: Arc<G>,
}

impl<W, CP, G> WalletUseCase<W, CP, G>
where
    W: WalletRepository + Send + Sync + 'static,
    CP: CreditPackRepository + Send + Sync + 'static,
    G: PaymentGateway + Send + Sync + 'static,
{
    pub fn new(wallet_repo: Arc<W>, credit_pack_repo: Arc<CP>, gateway: Arc<G>) -> Self {
        Self {
            wallet_repo,
            credit_pack_repo,
            gateway,
        }
    }

    pub async fn get_wallet_balance(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<WalletBalanceDto> {
        let balance_cents = self
            .wallet_repo
            .get_balance(user_id, now)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "wallet: failed to compute balance");
                BookingError::from_storage(err)
            })?;

        Ok(WalletBalanceDto {
            user_id,
            balance_cents,
            as_of: now,
        })
    }

    pub async fn get_next_expiring_credits(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<Option<NextExpiringCredits>> {
        self.wallet_repo
            .get_next_expiring_credits(user_id, now)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "wallet: failed to load expiring credits");
                BookingError::from_storage(err)
            })
    }

    pub async fn list_transactions(
        &self,
        user_id: Uuid,
    ) -> UseCaseResult<Vec<WalletTransactionEntity>> {
        self.wallet_repo
            .list_transactions(user_id)
            .await
            .map_err(|err| {
                error!(%user_id, db_error = ?err, "wallet: failed to list transactions");
                BookingError::Internal(err)
            })
    }

    pub async fn list_credit_packs(&self) -> UseCaseResult<Vec<CreditPackEntity>> {
        self.credit_pack_repo.list_active().await.map_err(|err| {
            error!(db_error = ?err, "wallet: failed to list credit packs");
            BookingError::Internal(err)
        })
    }

    /// Credits are granted when the confirmed payment event arrives.
    pub async fn create_credit_pack_intent(
        &self,
        user_id: Uuid,
        credit_pack_id: Uuid,
        now: DateTime<Utc>,
    ) -> UseCaseResult<ChargeIntentDto> {
        let pack = self
            .credit_pack_repo
            .find_active_by_id(credit_pack_id)
            .await
            .map_err(|err| {
                error!(%credit_pack_id, db_error = ?err, "wallet: failed to load credit pack");
                BookingError::Internal(err)
            })?
            .ok_or_else(|| BookingError::NotFound(format!("credit pack {credit_pack_id}")))?;

        let metadata = ChargeMetadata::CreditPack {
            user_id,
            credit_pack_id: pack.id,
        }
        .to_metadata();
        let idempotency_key = format!(
            "credit-pack-intent-{}-{}-{}",
            user_id,
            pack.id,
            now.timestamp() / 60
        );

        let intent = self
            .gateway
            .create_charge_intent(pack.price_cents, metadata, idempotency_key)
            .await
            .map_err(|err| {
                error!(%user_id, credit_pack_id = %pack.id, gateway_error = ?err, "wallet: credit pack intent failed");
                BookingError::ExternalService("payment provider unavailable".to_string())
            })?;

        info!(
            %user_id,
            credit_pack_id = %pack.id,
            intent_id = %intent.id,
            amount_cents = pack.price_cents,
            "wallet: credit pack intent created"
        );

        Ok(ChargeIntentDto {
            intent_id: intent.id,
            client_secret: intent.client_secret,
            amount_cents: pack.price_cents,
        })
    }
}
