use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, dsl::exists, insert_into, prelude::*, select};
use std::sync::Arc;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::processed_payment_events},
};
use domain::{
    entities::processed_payment_events::InsertProcessedPaymentEventEntity,
    repositories::payment_events::PaymentEventRepository,
};

pub struct PaymentEventPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl PaymentEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl PaymentEventRepository for PaymentEventPostgres {
    async fn is_processed(&self, event_id: String) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let processed = select(exists(
            processed_payment_events::table.filter(processed_payment_events::event_id.eq(event_id)),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(processed)
    }

    async fn mark_processed(&self, event: InsertProcessedPaymentEventEntity) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let inserted = insert_into(processed_payment_events::table)
            .values(&event)
            .on_conflict(processed_payment_events::event_id)
            .do_nothing()
            .execute(&mut conn)?;

        Ok(inserted == 1)
    }
}
