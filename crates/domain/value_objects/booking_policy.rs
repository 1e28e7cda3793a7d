use chrono::{DateTime, Duration, NaiveTime, Offset, Utc};

use crate::domain::value_objects::slot_grid::{OpeningHours, SlotLayout};

/// Club-wide rules shared by the grid, the reservation paths and the cancellation engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookingPolicy {
    pub opening_hours: OpeningHours,
    pub slot_layout: SlotLayout,
    pub max_advance_days: i64,
    pub cancellation_cutoff_hours: i64,
    pub pending_ttl_minutes: i64,
}

impl BookingPolicy {
    /// Last instant at which a booking starting at `start_at` may still be cancelled (exclusive).
    pub fn cancellation_deadline(&self, start_at: DateTime<Utc>) -> DateTime<Utc> {
        start_at - Duration::hours(self.cancellation_cutoff_hours)
    }

    pub fn can_cancel(&self, start_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        now < self.cancellation_deadline(start_at)
    }

    pub fn booking_horizon(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::days(self.max_advance_days)
    }

    pub fn pending_expiry_cutoff(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - Duration::minutes(self.pending_ttl_minutes)
    }
}

impl Default for BookingPolicy {
    fn default() -> Self {
        Self {
            opening_hours: OpeningHours {
                opens_at: NaiveTime::from_hms_opt(8, 0, 0).unwrap_or(NaiveTime::MIN),
                closes_at: NaiveTime::from_hms_opt(22, 0, 0).unwrap_or(NaiveTime::MIN),
                utc_offset: Utc.fix(),
            },
            slot_layout: SlotLayout::EvenDivision,
            max_advance_days: 30,
            cancellation_cutoff_hours: 24,
            pending_ttl_minutes: 15,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn cancellation_cutoff_is_exact() {
        let policy = BookingPolicy::default();
        let start_at = Utc.with_ymd_and_hms(2025, 6, 10, 14, 0, 0).unwrap();

        assert!(policy.can_cancel(start_at, start_at - Duration::hours(25)));
        assert!(policy.can_cancel(start_at, start_at - Duration::hours(24) - Duration::seconds(1)));
        assert!(!policy.can_cancel(start_at, start_at - Duration::hours(24)));
        assert!(!policy.can_cancel(start_at, start_at - Duration::hours(23)));
    }
}
