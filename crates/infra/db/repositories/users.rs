use anyhow::Result;
use async_trait::async_trait;
use diesel::{RunQueryDsl, dsl::exists, prelude::*, select};
use std::sync::Arc;
use uuid::Uuid;

use crate::{
    domain::repositories::users::UserRepository,
    infra::db::postgres::{postgres_connection::PgPoolSquad, schema::app_users},
};

pub struct UserPostgres {
    db_pool: Arc<PgPoolSquad>,
}

impl UserPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>) -> Self {
        Self { db_pool }
    }
}

#[async_trait]
impl UserRepository for UserPostgres {
    async fn exists(&self, user_id: Uuid) -> Result<bool> {
        let mut conn = Arc::clone(&self.db_pool).get()?;

        let found = select(exists(
            app_users::table
                .filter(app_users::id.eq(user_id))
                .filter(app_users::status.eq("active")),
        ))
        .get_result::<bool>(&mut conn)?;

        Ok(found)
    }
}
