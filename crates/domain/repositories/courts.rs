use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::{entities::courts::CourtEntity, value_objects::courts::CourtFilter};

#[async_trait]
#[automock]
pub trait CourtRepository {
    async fn find_active_by_id(&self, court_id: Uuid) -> Result<Option<CourtEntity>>;
    /// Active courts ordered by location, then id.
    async fn list_active(&self, filter: CourtFilter) -> Result<Vec<CourtEntity>>;
}
