use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::domain::{
    entities::wallet_transactions::WalletTransactionEntity,
    value_objects::wallet::{NewWalletTransaction, NextExpiringCredits},
};

#[async_trait]
#[automock]
pub trait WalletRepository {
    /// Appends a ledger write under serializable isolation and returns its
    /// first row.
    ///
    /// A `payment` is split per credit lot it spends and a booking `refund`
    /// per payment row it reverses; every row inherits the expiry of the
    /// credit it moves. A `payment` that would leave the balance negative
    /// fails with `InsufficientLedgerBalance` and writes nothing.
    async fn record_transaction(
        &self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransactionEntity>;
    async fn get_balance(&self, user_id: Uuid, as_of: DateTime<Utc>) -> Result<i64>;
    async fn get_next_expiring_credits(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Option<NextExpiringCredits>>;
    /// Newest first.
    async fn list_transactions(&self, user_id: Uuid) -> Result<Vec<WalletTransactionEntity>>;
    async fn find_refund_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<WalletTransactionEntity>>;
    async fn find_by_external_payment_id(
        &self,
        external_payment_id: String,
    ) -> Result<Option<WalletTransactionEntity>>;
}
