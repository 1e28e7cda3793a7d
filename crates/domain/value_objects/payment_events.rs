use std::collections::HashMap;

use anyhow::{Context, Result, anyhow};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::domain::value_objects::time_ranges::TimeRange;

pub const METADATA_KIND: &str = "kind";
pub const KIND_BOOKING: &str = "booking";
pub const KIND_CREDIT_PACK: &str = "credit_pack";

/// What a gateway charge pays for, as carried in its metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChargeMetadata {
    Booking {
        user_id: Uuid,
        court_id: Uuid,
        range: TimeRange,
    },
    CreditPack {
        user_id: Uuid,
        credit_pack_id: Uuid,
    },
}

impl ChargeMetadata {
    pub fn user_id(&self) -> Uuid {
        match self {
            ChargeMetadata::Booking { user_id, .. } | ChargeMetadata::CreditPack { user_id, .. } => {
                *user_id
            }
        }
    }

    pub fn to_metadata(&self) -> HashMap<String, String> {
        match self {
            ChargeMetadata::Booking {
                user_id,
                court_id,
                range,
            } => HashMap::from([
                (METADATA_KIND.to_string(), KIND_BOOKING.to_string()),
                ("user_id".to_string(), user_id.to_string()),
                ("court_id".to_string(), court_id.to_string()),
                ("start_at".to_string(), range.start_at.to_rfc3339()),
                ("end_at".to_string(), range.end_at.to_rfc3339()),
            ]),
            ChargeMetadata::CreditPack {
                user_id,
                credit_pack_id,
            } => HashMap::from([
                (METADATA_KIND.to_string(), KIND_CREDIT_PACK.to_string()),
                ("user_id".to_string(), user_id.to_string()),
                ("credit_pack_id".to_string(), credit_pack_id.to_string()),
            ]),
        }
    }

    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self> {
        let kind = metadata
            .get(METADATA_KIND)
            .ok_or_else(|| anyhow!("metadata kind is required"))?;
        let user_id = parse_uuid(metadata, "user_id")?;

        match kind.as_str() {
            KIND_BOOKING => {
                let court_id = parse_uuid(metadata, "court_id")?;
                let start_at = parse_timestamp(metadata, "start_at")?;
                let end_at = parse_timestamp(metadata, "end_at")?;
                Ok(ChargeMetadata::Booking {
                    user_id,
                    court_id,
                    range: TimeRange::new(start_at, end_at)?,
                })
            }
            KIND_CREDIT_PACK => Ok(ChargeMetadata::CreditPack {
                user_id,
                credit_pack_id: parse_uuid(metadata, "credit_pack_id")?,
            }),
            other => Err(anyhow!("unsupported metadata kind {other}")),
        }
    }
}

fn parse_uuid(metadata: &HashMap<String, String>, key: &str) -> Result<Uuid> {
    let raw = metadata
        .get(key)
        .ok_or_else(|| anyhow!("metadata {key} is required"))?;
    Uuid::parse_str(raw).with_context(|| format!("metadata {key} is not a uuid"))
}

fn parse_timestamp(metadata: &HashMap<String, String>, key: &str) -> Result<DateTime<Utc>> {
    let raw = metadata
        .get(key)
        .ok_or_else(|| anyhow!("metadata {key} is required"))?;
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .with_context(|| format!("metadata {key} is not an RFC 3339 timestamp"))
}

/// How the gate settled one gateway event. Every variant is acknowledged to the sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentEventOutcome {
    BookingCreated,
    CreditsPurchased,
    DuplicateEvent,
    DuplicatePayment,
    RefundedAmountMismatch,
    RefundedSlotConflict,
    RefundedInvalidReference,
    Ignored,
}

impl PaymentEventOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentEventOutcome::BookingCreated => "booking_created",
            PaymentEventOutcome::CreditsPurchased => "credits_purchased",
            PaymentEventOutcome::DuplicateEvent => "duplicate_event",
            PaymentEventOutcome::DuplicatePayment => "duplicate_payment",
            PaymentEventOutcome::RefundedAmountMismatch => "refunded_amount_mismatch",
            PaymentEventOutcome::RefundedSlotConflict => "refunded_slot_conflict",
            PaymentEventOutcome::RefundedInvalidReference => "refunded_invalid_reference",
            PaymentEventOutcome::Ignored => "ignored",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct WebhookAck {
    pub received: bool,
    pub outcome: PaymentEventOutcome,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn booking_metadata_survives_the_gateway() {
        let start_at = Utc.with_ymd_and_hms(2025, 6, 2, 14, 0, 0).unwrap();
        let end_at = Utc.with_ymd_and_hms(2025, 6, 2, 15, 30, 0).unwrap();
        let metadata = ChargeMetadata::Booking {
            user_id: Uuid::new_v4(),
            court_id: Uuid::new_v4(),
            range: TimeRange::new(start_at, end_at).unwrap(),
        };

        let parsed = ChargeMetadata::from_metadata(&metadata.to_metadata()).unwrap();
        assert_eq!(parsed, metadata);
    }

    #[test]
    fn incomplete_metadata_is_rejected() {
        let mut raw = HashMap::from([
            (METADATA_KIND.to_string(), KIND_BOOKING.to_string()),
            ("user_id".to_string(), Uuid::new_v4().to_string()),
            ("court_id".to_string(), "not-a-uuid".to_string()),
        ]);
        let err = ChargeMetadata::from_metadata(&raw).unwrap_err().to_string();
        assert!(err.contains("court_id"), "got: {err}");

        raw.insert(METADATA_KIND.to_string(), "gift_card".to_string());
        assert!(ChargeMetadata::from_metadata(&raw).is_err());

        raw.remove(METADATA_KIND);
        assert!(ChargeMetadata::from_metadata(&raw).is_err());
    }
}
