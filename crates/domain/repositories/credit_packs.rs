use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;
use uuid::Uuid;

use crate::domain::entities::credit_packs::CreditPackEntity;

#[async_trait]
#[automock]
pub trait CreditPackRepository {
    async fn find_active_by_id(&self, credit_pack_id: Uuid) -> Result<Option<CreditPackEntity>>;
    async fn list_active(&self) -> Result<Vec<CreditPackEntity>>;
}
