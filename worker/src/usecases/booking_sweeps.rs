use chrono::{DateTime, Duration, Utc};
use crates::domain::{
    entities::bookings::BookingEntity,
    repositories::{bookings::BookingRepository, notifications::BookingNotifier},
    value_objects::{booking_policy::BookingPolicy, notifications::BookingNotification},
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub expired: usize,
    pub completed: usize,
    pub reminders_sent: usize,
    /// Steps that errored this run; the remaining steps still ran.
    pub failed_steps: usize,
}

/// Periodic booking housekeeping. Every transition is a conditional update,
/// so a booking confirmed or cancelled concurrently is never overwritten.
pub struct BookingSweepUseCase {
    booking_repository: Arc<dyn BookingRepository + Send + Sync>,
    notifier: Arc<dyn BookingNotifier + Send + Sync>,
    policy: BookingPolicy,
    reminder_lead: Duration,
}

impl BookingSweepUseCase {
    pub fn new(
        booking_repository: Arc<dyn BookingRepository + Send + Sync>,
        notifier: Arc<dyn BookingNotifier + Send + Sync>,
        policy: BookingPolicy,
        reminder_lead: Duration,
    ) -> Self {
        Self {
            booking_repository,
            notifier,
            policy,
            reminder_lead,
        }
    }

    pub async fn run(&self, now: DateTime<Utc>) -> SweepReport {
        let mut report = SweepReport::default();

        match self.expire_stale_pending(now).await {
            Ok(expired) => report.expired = expired,
            Err(e) => {
                error!(error = %e, "booking_sweeps: pending expiry failed");
                report.failed_steps += 1;
            }
        }

        match self.complete_elapsed(now).await {
            Ok(completed) => report.completed = completed,
            Err(e) => {
                error!(error = %e, "booking_sweeps: completion failed");
                report.failed_steps += 1;
            }
        }

        match self.send_reminders(now).await {
            Ok(sent) => report.reminders_sent = sent,
            Err(e) => {
                error!(error = %e, "booking_sweeps: reminder dispatch failed");
                report.failed_steps += 1;
            }
        }

        info!(
            expired = report.expired,
            completed = report.completed,
            reminders_sent = report.reminders_sent,
            failed_steps = report.failed_steps,
            "booking_sweeps: sweep finished"
        );
        report
    }

    /// pending bookings older than the TTL release their slot.
    pub async fn expire_stale_pending(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let cutoff = self.policy.pending_expiry_cutoff(now);
        let expired = self.booking_repository.expire_stale_pending(cutoff).await?;
        if expired > 0 {
            info!(expired, %cutoff, "booking_sweeps: expired stale pending bookings");
        }
        Ok(expired)
    }

    pub async fn complete_elapsed(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let completed = self.booking_repository.complete_elapsed(now).await?;
        if completed > 0 {
            info!(completed, "booking_sweeps: completed elapsed bookings");
        }
        Ok(completed)
    }

    /// Confirmed bookings starting within the lead window get one reminder.
    /// The `reminder_sent` flag is claimed before notifying, so overlapping
    /// sweeps never remind twice.
    pub async fn send_reminders(&self, now: DateTime<Utc>) -> anyhow::Result<usize> {
        let candidates = self
            .booking_repository
            .list_reminder_candidates(now, now + self.reminder_lead)
            .await?;

        let mut sent = 0;
        for booking in candidates {
            match self.booking_repository.mark_reminder_sent(booking.id).await {
                Ok(true) => {
                    self.notify_reminder(&booking).await;
                    sent += 1;
                }
                Ok(false) => {
                    info!(booking_id = %booking.id, "booking_sweeps: reminder already claimed");
                }
                Err(e) => {
                    warn!(booking_id = %booking.id, error = %e, "booking_sweeps: failed to claim reminder");
                }
            }
        }

        Ok(sent)
    }

    async fn notify_reminder(&self, booking: &BookingEntity) {
        let notification = BookingNotification::BookingReminder {
            booking_id: booking.id,
            user_id: booking.user_id,
            court_id: booking.court_id,
            start_at: booking.start_at,
        };
        if let Err(e) = self.notifier.notify(notification).await {
            warn!(booking_id = %booking.id, error = %e, "booking_sweeps: reminder notification failed");
        }
    }
}
