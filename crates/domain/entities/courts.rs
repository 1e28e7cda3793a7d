use chrono::{DateTime, Utc};
use diesel::prelude::*;
use serde::Serialize;
use uuid::Uuid;

use crate::infra::db::postgres::schema::courts;

/// Reference data; rows are seeded out of band and never written by the engine.
#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable, Serialize)]
#[diesel(table_name = courts)]
pub struct CourtEntity {
    pub id: Uuid,
    pub name: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub capacity: i32,
    pub location: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}
