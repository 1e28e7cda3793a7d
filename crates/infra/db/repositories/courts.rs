use anyhow::Result;
use async_trait::async_trait;
use diesel::{OptionalExtension, RunQueryDsl, prelude::*};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::courts},
};
use domain::{
    entities::courts::CourtEntity, repositories::courts::CourtRepository,
    value_objects::courts::CourtFilter,
};

pub struct CourtPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl CourtPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl CourtRepository for CourtPostgres {
    async fn find_active_by_id(&self, court_id: Uuid) -> Result<Option<CourtEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let court = courts::table
            .filter(courts::id.eq(court_id))
            .filter(courts::is_active.eq(true))
            .select(CourtEntity::as_select())
            .first::<CourtEntity>(&mut conn)
            .optional()?;

        Ok(court)
    }

    async fn list_active(&self, filter: CourtFilter) -> Result<Vec<CourtEntity>> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let mut query = courts::table
            .filter(courts::is_active.eq(true))
            .select(CourtEntity::as_select())
            .into_boxed();

        if let Some(court_id) = filter.court_id {
            query = query.filter(courts::id.eq(court_id));
        }
        if let Some(duration_minutes) = filter.duration_minutes {
            query = query.filter(courts::duration_minutes.eq(duration_minutes));
        }
        if let Some(location) = filter.location {
            query = query.filter(courts::location.eq(location));
        }

        let rows = query
            .order((courts::location.asc(), courts::id.asc()))
            .load::<CourtEntity>(&mut conn)?;

        Ok(rows)
    }
}
