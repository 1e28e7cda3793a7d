use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::entities::processed_payment_events::InsertProcessedPaymentEventEntity;

#[async_trait]
#[automock]
pub trait PaymentEventRepository {
    async fn is_processed(&self, event_id: String) -> Result<bool>;
    /// Returns false when another delivery already recorded the event.
    async fn mark_processed(&self, event: InsertProcessedPaymentEventEntity) -> Result<bool>;
}
