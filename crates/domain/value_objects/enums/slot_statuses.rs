use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Listed in precedence order: the first matching status labels a slot.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SlotStatus {
    Past,
    Blocked,
    Booked,
    Available,
}

impl Display for SlotStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let status = match self {
            SlotStatus::Past => "past",
            SlotStatus::Blocked => "blocked",
            SlotStatus::Booked => "booked",
            SlotStatus::Available => "available",
        };
        write!(f, "{}", status)
    }
}
