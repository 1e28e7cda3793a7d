use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::credit_packs;

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = credit_packs)]
pub struct CreditPackEntity {
    pub id: Uuid,
    pub name: String,
    pub price_cents: i64,
    /// Wallet credit granted on purchase, never less than `price_cents`.
    pub credits_cents: i64,
    pub validity_months: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
