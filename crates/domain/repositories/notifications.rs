use anyhow::Result;
use async_trait::async_trait;
use mockall::automock;

use crate::domain::value_objects::notifications::BookingNotification;

#[async_trait]
#[automock]
pub trait BookingNotifier {
    async fn notify(&self, notification: BookingNotification) -> Result<()>;
}
