use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::{
    entities::blocked_slots::BlockedSlotEntity, value_objects::time_ranges::TimeRange,
};

#[async_trait]
#[automock]
pub trait BlockedSlotRepository {
    /// Blocks overlapping `range`, including court-wide blocks.
    async fn list_overlapping(&self, range: TimeRange) -> Result<Vec<BlockedSlotEntity>>;
}
