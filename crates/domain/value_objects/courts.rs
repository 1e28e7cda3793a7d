use serde::Deserialize;
use uuid::Uuid;

/// Optional narrowing for slot-grid queries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CourtFilter {
    pub court_id: Option<Uuid>,
    pub duration_minutes: Option<i32>,
    pub location: Option<String>,
}
