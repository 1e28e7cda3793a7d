use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, prelude::*};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::blocked_slots},
};
use domain::{
    entities::blocked_slots::BlockedSlotEntity,
    repositories::blocked_slots::BlockedSlotRepository, value_objects::time_ranges::TimeRange,
};

pub struct BlockedSlotPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl BlockedSlotPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl BlockedSlotRepository for BlockedSlotPostgres {
    async fn list_overlapping(&self, range: TimeRange) -> Result<Vec<BlockedSlotEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let rows = blocked_slots::table
            .filter(blocked_slots::start_at.lt(range.end_at))
            .filter(blocked_slots::end_at.gt(range.start_at))
            .select(BlockedSlotEntity::as_select())
            .order(blocked_slots::start_at.asc())
            .load::<BlockedSlotEntity>(&mut conn)?;

        Ok(rows)
    }
}
