use anyhow::{Result, bail};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Half-open interval `[start_at, end_at)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
}

impl TimeRange {
    pub fn new(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Result<Self> {
        if end_at <= start_at {
            bail!("end_at must be after start_at");
        }
        Ok(Self { start_at, end_at })
    }

    /// For rows already guarded by a database CHECK.
    pub fn new_unchecked(start_at: DateTime<Utc>, end_at: DateTime<Utc>) -> Self {
        Self { start_at, end_at }
    }

    pub fn overlaps(&self, other: &TimeRange) -> bool {
        self.start_at < other.end_at && self.end_at > other.start_at
    }

    pub fn duration(&self) -> Duration {
        self.end_at - self.start_at
    }

    pub fn duration_minutes(&self) -> i64 {
        self.duration().num_minutes()
    }

    pub fn contains(&self, other: &TimeRange) -> bool {
        self.start_at <= other.start_at && other.end_at <= self.end_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 2, hour, minute, 0).unwrap()
    }

    #[test]
    fn rejects_empty_and_inverted_ranges() {
        assert!(TimeRange::new(at(10, 0), at(10, 0)).is_err());
        assert!(TimeRange::new(at(11, 0), at(10, 0)).is_err());
    }

    #[test]
    fn adjacent_ranges_do_not_overlap() {
        let first = TimeRange::new(at(14, 0), at(15, 30)).unwrap();
        let second = TimeRange::new(at(15, 30), at(17, 0)).unwrap();
        assert!(!first.overlaps(&second));
        assert!(!second.overlaps(&first));
    }

    #[test]
    fn partial_and_nested_ranges_overlap() {
        let slot = TimeRange::new(at(14, 0), at(15, 30)).unwrap();
        let partial = TimeRange::new(at(15, 0), at(16, 0)).unwrap();
        let nested = TimeRange::new(at(14, 30), at(15, 0)).unwrap();
        assert!(slot.overlaps(&partial));
        assert!(slot.overlaps(&nested));
        assert!(nested.overlaps(&slot));
        assert_eq!(slot.duration_minutes(), 90);
    }
}
