use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    domain::value_objects::{
        enums::wallet_transaction_types::WalletTransactionType, wallet::LedgerAmount,
    },
    infra::db::postgres::schema::wallet_transactions,
};

/// One row of the append-only credit ledger.
#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = wallet_transactions)]
pub struct WalletTransactionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    #[serde(rename = "type")]
    pub type_: String,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    pub booking_id: Option<Uuid>,
    pub credit_pack_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub external_payment_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl WalletTransactionEntity {
    pub fn transaction_type(&self) -> Option<WalletTransactionType> {
        WalletTransactionType::from_str(&self.type_)
    }

    pub fn ledger_amount(&self) -> LedgerAmount {
        LedgerAmount {
            amount_cents: self.amount_cents,
            expires_at: self.expires_at,
        }
    }
}

#[derive(Debug, Clone, Insertable)]
#[diesel(table_name = wallet_transactions)]
pub struct InsertWalletTransactionEntity {
    pub user_id: Uuid,
    pub type_: String,
    pub amount_cents: i64,
    pub balance_after_cents: i64,
    pub booking_id: Option<Uuid>,
    pub credit_pack_id: Option<Uuid>,
    pub expires_at: Option<DateTime<Utc>>,
    pub external_payment_id: Option<String>,
}
