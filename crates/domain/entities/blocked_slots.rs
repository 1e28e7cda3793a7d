use chrono::{DateTime, Utc};
use diesel::prelude::*;
use uuid::Uuid;

use crate::{domain::value_objects::time_ranges::TimeRange, infra::db::postgres::schema::blocked_slots};

#[derive(Debug, Clone, PartialEq, Identifiable, Selectable, Queryable)]
#[diesel(table_name = blocked_slots)]
pub struct BlockedSlotEntity {
    pub id: Uuid,
    /// `None` blocks every court.
    pub court_id: Option<Uuid>,
    pub start_at: DateTime<Utc>,
    pub end_at: DateTime<Utc>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl BlockedSlotEntity {
    pub fn range(&self) -> TimeRange {
        TimeRange::new_unchecked(self.start_at, self.end_at)
    }

    pub fn applies_to(&self, court_id: Uuid) -> bool {
        self.court_id.is_none_or(|blocked_court| blocked_court == court_id)
    }
}
