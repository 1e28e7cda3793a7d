use anyhow::{Result, bail};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::{OptionalExtension, PgConnection, QueryResult, RunQueryDsl, insert_into, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{
        postgres_connection::PgPoolSquad, schema::wallet_transactions,
        transactions::run_serializable,
    },
};
use domain::{
    entities::wallet_transactions::{InsertWalletTransactionEntity, WalletTransactionEntity},
    repositories::wallet::WalletRepository,
    value_objects::{
        enums::wallet_transaction_types::WalletTransactionType,
        storage_errors::InsufficientLedgerBalance,
        wallet::{
            LedgerAmount, NewWalletTransaction, NextExpiringCredits, allocate_debit, balance_at,
            mirror_refund, next_expiring_credits,
        },
    },
};

pub struct WalletPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl WalletPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

pub(crate) fn load_ledger(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Vec<LedgerAmount>> {
    let rows = wallet_transactions::table
        .filter(wallet_transactions::user_id.eq(user_id))
        .select((
            wallet_transactions::amount_cents,
            wallet_transactions::expires_at,
        ))
        .load::<(i64, Option<DateTime<Utc>>)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(amount_cents, expires_at)| LedgerAmount {
            amount_cents,
            expires_at,
        })
        .collect())
}

fn load_booking_payments(
    conn: &mut PgConnection,
    user_id: Uuid,
    booking_id: Uuid,
) -> QueryResult<Vec<LedgerAmount>> {
    let rows = wallet_transactions::table
        .filter(wallet_transactions::user_id.eq(user_id))
        .filter(wallet_transactions::booking_id.eq(booking_id))
        .filter(wallet_transactions::type_.eq(WalletTransactionType::Payment.as_str()))
        .select((
            wallet_transactions::amount_cents,
            wallet_transactions::expires_at,
        ))
        .order((
            wallet_transactions::created_at.asc(),
            wallet_transactions::id.asc(),
        ))
        .load::<(i64, Option<DateTime<Utc>>)>(conn)?;

    Ok(rows
        .into_iter()
        .map(|(amount_cents, expires_at)| LedgerAmount {
            amount_cents,
            expires_at,
        })
        .collect())
}

/// Appends a ledger write on a connection that is already inside a
/// serializable transaction. Payments are split per credit lot they spend and
/// booking refunds per payment row they reverse, each row carrying the expiry
/// of the credit it moves; `transaction.expires_at` only applies to other
/// writes. Payments that would overdraw return `Err` in the inner result
/// without writing. Rows come back in insertion order.
pub(crate) fn append_ledger_rows(
    conn: &mut PgConnection,
    transaction: &NewWalletTransaction,
) -> QueryResult<std::result::Result<Vec<WalletTransactionEntity>, InsufficientLedgerBalance>> {
    let ledger = load_ledger(conn, transaction.user_id)?;
    let mut balance_cents = balance_at(&ledger, transaction.as_of);

    let slices = match (transaction.transaction_type, transaction.booking_id) {
        (WalletTransactionType::Payment, _) => {
            let required_cents = -transaction.amount_cents;
            let allocated = (balance_cents >= required_cents)
                .then(|| allocate_debit(&ledger, required_cents, transaction.as_of))
                .flatten();
            match allocated {
                Some(slices) => slices,
                None => {
                    return Ok(Err(InsufficientLedgerBalance {
                        balance_cents,
                        required_cents,
                    }));
                }
            }
        }
        (WalletTransactionType::Refund, Some(booking_id)) => {
            let payments = load_booking_payments(conn, transaction.user_id, booking_id)?;
            mirror_refund(&payments, transaction.amount_cents)
        }
        _ => vec![LedgerAmount {
            amount_cents: transaction.amount_cents,
            expires_at: transaction.expires_at,
        }],
    };

    let mut inserted = Vec::with_capacity(slices.len());
    for slice in slices {
        // Expired slices do not move the live balance.
        if slice.is_live_at(transaction.as_of) {
            balance_cents += slice.amount_cents;
        }

        let row = InsertWalletTransactionEntity {
            user_id: transaction.user_id,
            type_: transaction.transaction_type.as_str().to_string(),
            amount_cents: slice.amount_cents,
            balance_after_cents: balance_cents,
            booking_id: transaction.booking_id,
            credit_pack_id: transaction.credit_pack_id,
            expires_at: slice.expires_at,
            external_payment_id: transaction.external_payment_id.clone(),
        };

        inserted.push(
            insert_into(wallet_transactions::table)
                .values(&row)
                .returning(WalletTransactionEntity::as_select())
                .get_result::<WalletTransactionEntity>(conn)?,
        );
    }

    Ok(Ok(inserted))
}

#[async_trait]
impl WalletRepository for WalletPostgres {
    async fn record_transaction(
        &self,
        transaction: NewWalletTransaction,
    ) -> Result<WalletTransactionEntity> {
        if !transaction
            .transaction_type
            .accepts_amount(transaction.amount_cents)
        {
            bail!(
                "wallet: amount {} is not valid for a {} transaction",
                transaction.amount_cents,
                transaction.transaction_type
            );
        }

        let mut conn = Arc::clone(&self.db_pool).get()?;
        let recorded = run_serializable(&mut conn, |conn| append_ledger_rows(conn, &transaction))?;

        recorded?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("wallet: {} wrote no ledger rows", transaction.transaction_type))
    }

    async fn get_balance(&self, user_id: Uuid, as_of: DateTime<Utc>) -> Result<i64> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let ledger = run_serializable(&mut conn, |conn| load_ledger(conn, user_id))?;

        Ok(balance_at(&ledger, as_of))
    }

    async fn get_next_expiring_credits(
        &self,
        user_id: Uuid,
        as_of: DateTime<Utc>,
    ) -> Result<Option<NextExpiringCredits>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;
        let ledger = run_serializable(&mut conn, |conn| load_ledger(conn, user_id))?;

        Ok(next_expiring_credits(&ledger, as_of))
    }

    async fn list_transactions(&self, user_id: Uuid) -> Result<Vec<WalletTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = wallet_transactions::table
            .filter(wallet_transactions::user_id.eq(user_id))
            .select(WalletTransactionEntity::as_select())
            .order((
                wallet_transactions::created_at.desc(),
                wallet_transactions::id.desc(),
            ))
            .load::<WalletTransactionEntity>(&mut conn)?;

        Ok(rows)
    }

    async fn find_refund_for_booking(
        &self,
        booking_id: Uuid,
    ) -> Result<Option<WalletTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let refund = wallet_transactions::table
            .filter(wallet_transactions::booking_id.eq(booking_id))
            .filter(wallet_transactions::type_.eq(WalletTransactionType::Refund.as_str()))
            .select(WalletTransactionEntity::as_select())
            .first::<WalletTransactionEntity>(&mut conn)
            .optional()?;

        Ok(refund)
    }

    async fn find_by_external_payment_id(
        &self,
        external_payment_id: String,
    ) -> Result<Option<WalletTransactionEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let row = wallet_transactions::table
            .filter(wallet_transactions::external_payment_id.eq(external_payment_id))
            .select(WalletTransactionEntity::as_select())
            .first::<WalletTransactionEntity>(&mut conn)
            .optional()?;

        Ok(row)
    }
}
