use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::domain::{
    repositories::notifications::BookingNotifier,
    value_objects::notifications::BookingNotification,
};

/// Emits every notification as a structured log event. Delivery channels
/// (email, push) subscribe to these events downstream.
#[derive(Debug, Default, Clone)]
pub struct TracingBookingNotifier;

#[async_trait]
impl BookingNotifier for TracingBookingNotifier {
    async fn notify(&self, notification: BookingNotification) -> Result<()> {
        let kind = notification.kind();

        match notification {
            BookingNotification::BookingConfirmed {
                booking_id,
                user_id,
                court_id,
                start_at,
                end_at,
                price_cents,
                payment_type,
            } => info!(
                kind,
                %booking_id,
                %user_id,
                %court_id,
                %start_at,
                %end_at,
                price_cents,
                payment_type = %payment_type,
                "notifications: booking confirmed"
            ),
            BookingNotification::BookingCancelled {
                booking_id,
                user_id,
                start_at,
                refund_method,
                refunded_cents,
            } => info!(
                kind,
                %booking_id,
                %user_id,
                %start_at,
                refund_method = ?refund_method,
                refunded_cents,
                "notifications: booking cancelled"
            ),
            BookingNotification::BookingReminder {
                booking_id,
                user_id,
                court_id,
                start_at,
            } => info!(
                kind,
                %booking_id,
                %user_id,
                %court_id,
                %start_at,
                "notifications: booking reminder"
            ),
            BookingNotification::PaymentRefunded {
                user_id,
                payment_id,
                reason,
            } => info!(
                kind,
                user_id = ?user_id,
                payment_id = %payment_id,
                reason = reason.tag(),
                "notifications: payment refunded"
            ),
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    #[tokio::test]
    async fn every_notification_is_accepted() {
        let notifier = TracingBookingNotifier;

        let result = notifier
            .notify(BookingNotification::BookingReminder {
                booking_id: Uuid::new_v4(),
                user_id: Uuid::new_v4(),
                court_id: Uuid::new_v4(),
                start_at: Utc::now(),
            })
            .await;

        assert!(result.is_ok());
    }
}
