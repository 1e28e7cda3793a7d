use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::credit_packs},
};
use domain::{
    entities::credit_packs::CreditPackEntity, repositories::credit_packs::CreditPackRepository,
};

pub struct CreditPackPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CreditPackPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CreditPackRepository for CreditPackPostgres {
    async fn find_active_by_id(&self, credit_pack_id: Uuid) -> Result<Option<CreditPackEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let pack = credit_packs::table
            .filter(credit_packs::id.eq(credit_pack_id))
            .filter(credit_packs::is_active.eq(true))
            .select(CreditPackEntity::as_select())
            .first::<CreditPackEntity>(&mut conn)
            .optional()?;

        Ok(pack)
    }

    async fn list_active(&self) -> Result<Vec<CreditPackEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let packs = credit_packs::table
            .filter(credit_packs::is_active.eq(true))
            .select(CreditPackEntity::as_select())
            .order(credit_packs::price_cents.asc())
            .load::<CreditPackEntity>(&mut conn)?;

        Ok(packs)
    }
}
