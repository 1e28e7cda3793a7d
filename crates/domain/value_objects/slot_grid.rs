//! Per-day slot layout and status labelling for a single court.

use chrono::{DateTime, Duration, FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::{
    entities::{blocked_slots::BlockedSlotEntity, bookings::BookingEntity, courts::CourtEntity},
    value_objects::{enums::slot_statuses::SlotStatus, time_ranges::TimeRange},
};

/// How the opening window is cut into slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotLayout {
    /// Back-to-back slots from opening time until the next one would overrun closing time.
    EvenDivision,
    /// Explicit start-time tables per duration; durations without a table fall back to even division.
    FixedStarts,
}

impl SlotLayout {
    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "even" | "even_division" => Some(SlotLayout::EvenDivision),
            "fixed" | "fixed_starts" => Some(SlotLayout::FixedStarts),
            _ => None,
        }
    }
}

/// Opening window in club-local time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpeningHours {
    pub opens_at: NaiveTime,
    pub closes_at: NaiveTime,
    pub utc_offset: FixedOffset,
}

impl OpeningHours {
    fn local_to_utc(&self, date: NaiveDate, time: NaiveTime) -> Option<DateTime<Utc>> {
        self.utc_offset
            .from_local_datetime(&date.and_time(time))
            .single()
            .map(|local| local.with_timezone(&Utc))
    }

    pub fn window(&self, date: NaiveDate) -> Option<TimeRange> {
        let opens = self.local_to_utc(date, self.opens_at)?;
        let closes = self.local_to_utc(date, self.closes_at)?;
        TimeRange::new(opens, closes).ok()
    }

    pub fn local_date(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&self.utc_offset).date_naive()
    }
}

const FIXED_STARTS_60: [(u32, u32); 14] = [
    (8, 0),
    (9, 0),
    (10, 0),
    (11, 0),
    (12, 0),
    (13, 0),
    (14, 0),
    (15, 0),
    (16, 0),
    (17, 0),
    (18, 0),
    (19, 0),
    (20, 0),
    (21, 0),
];

const FIXED_STARTS_90: [(u32, u32); 9] = [
    (8, 0),
    (9, 30),
    (11, 0),
    (12, 30),
    (14, 0),
    (15, 30),
    (17, 0),
    (18, 30),
    (20, 0),
];

fn fixed_start_table(duration_minutes: i64) -> Option<&'static [(u32, u32)]> {
    match duration_minutes {
        60 => Some(&FIXED_STARTS_60),
        90 => Some(&FIXED_STARTS_90),
        _ => None,
    }
}

/// Canonical slots of `duration_minutes` for `date`, ordered by start.
pub fn canonical_slots(
    layout: SlotLayout,
    hours: &OpeningHours,
    date: NaiveDate,
    duration_minutes: i64,
) -> Vec<TimeRange> {
    if duration_minutes <= 0 {
        return Vec::new();
    }
    let Some(window) = hours.window(date) else {
        return Vec::new();
    };
    let step = Duration::minutes(duration_minutes);

    match (layout, fixed_start_table(duration_minutes)) {
        (SlotLayout::FixedStarts, Some(table)) => table
            .iter()
            .filter_map(|&(hour, minute)| NaiveTime::from_hms_opt(hour, minute, 0))
            .filter_map(|time| hours.local_to_utc(date, time))
            .map(|start_at| TimeRange::new_unchecked(start_at, start_at + step))
            .filter(|slot| window.contains(slot))
            .collect(),
        _ => {
            let mut slots = Vec::new();
            let mut start_at = window.start_at;
            while start_at + step <= window.end_at {
                slots.push(TimeRange::new_unchecked(start_at, start_at + step));
                start_at += step;
            }
            slots
        }
    }
}

/// Whether `range` is exactly one of the canonical slots of its local day.
pub fn is_canonical_slot(
    layout: SlotLayout,
    hours: &OpeningHours,
    range: &TimeRange,
    duration_minutes: i64,
) -> bool {
    let date = hours.local_date(range.start_at);
    canonical_slots(layout, hours, date, duration_minutes)
        .iter()
        .any(|slot| slot == range)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct SlotView {
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub status: SlotStatus,
    /// Set only for `booked` slots held by the requesting user.
    pub is_own_booking: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourtSlotGrid {
    pub court_id: Uuid,
    pub court_name: String,
    pub location: String,
    pub duration_minutes: i32,
    pub price_cents: i64,
    pub slots: Vec<SlotView>,
}

pub struct SlotGridInput<'a> {
    pub court: &'a CourtEntity,
    pub date: NaiveDate,
    pub now: DateTime<Utc>,
    pub requesting_user: Option<Uuid>,
    pub bookings: &'a [BookingEntity],
    pub blocked_slots: &'a [BlockedSlotEntity],
}

/// Labels every canonical slot with `past` > `blocked` > `booked` > `available` precedence.
pub fn build_slot_grid(
    layout: SlotLayout,
    hours: &OpeningHours,
    input: SlotGridInput<'_>,
) -> CourtSlotGrid {
    let court = input.court;
    let slots = canonical_slots(layout, hours, input.date, court.duration_minutes.into())
        .into_iter()
        .map(|slot| {
            let (status, is_own_booking) = slot_status(&slot, &input);
            SlotView {
                start_at: slot.start_at,
                end_at: slot.end_at,
                status,
                is_own_booking,
            }
        })
        .collect();

    CourtSlotGrid {
        court_id: court.id,
        court_name: court.name.clone(),
        location: court.location.clone(),
        duration_minutes: court.duration_minutes,
        price_cents: court.price_cents,
        slots,
    }
}

fn slot_status(slot: &TimeRange, input: &SlotGridInput<'_>) -> (SlotStatus, bool) {
    let court_id = input.court.id;

    if slot.start_at <= input.now {
        return (SlotStatus::Past, false);
    }

    let blocked = input
        .blocked_slots
        .iter()
        .any(|block| block.applies_to(court_id) && block.range().overlaps(slot));
    if blocked {
        return (SlotStatus::Blocked, false);
    }

    let holder = input.bookings.iter().find(|booking| {
        booking.court_id == court_id && booking.holds_slot() && booking.range().overlaps(slot)
    });
    match holder {
        Some(booking) => (
            SlotStatus::Booked,
            input.requesting_user == Some(booking.user_id),
        ),
        None => (SlotStatus::Available, false),
    }
}
