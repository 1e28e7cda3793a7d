use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use crates::domain::{
    repositories::{
        blocked_slots::BlockedSlotRepository, bookings::BookingRepository,
        courts::CourtRepository,
    },
    value_objects::{
        booking_policy::BookingPolicy,
        courts::CourtFilter,
        slot_grid::{CourtSlotGrid, SlotGridInput, build_slot_grid},
    },
};
use tracing::{error, info};
use uuid::Uuid;

use crate::usecases::errors::{BookingError, UseCaseResult};

pub struct SlotGridUseCase<C, B, BS>
where
    C: CourtRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    BS: BlockedSlotRepository + Send + Sync + 'static,
{
    court_repo: Arc<C>,
    booking_repo: Arc<B>,
    blocked_slot_repo: Arc<BS>,
    policy: BookingPolicy,
}

impl<C, B, BS> SlotGridUseCase<C, B, BS>
where
    C: CourtRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    BS: BlockedSlotRepository + Send + Sync + 'static,
{
    pub fn new(
        court_repo: Arc<C>,
        booking_repo: Arc<B>,
        blocked_slot_repo: Arc<BS>,
        policy: BookingPolicy,
    ) -> Self {
        Self {
            court_repo,
            booking_repo,
            blocked_slot_repo,
            policy,
        }
    }

    /// One grid per active court matching `filter`, ordered by location then id.
    pub async fn get_slots_by_date(
        &self,
        date: &str,
        filter: CourtFilter,
        requesting_user: Option<Uuid>,
        now: DateTime<Utc>,
    ) -> UseCaseResult<Vec<CourtSlotGrid>> {
        let date = NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|_| BookingError::Validation(format!("invalid date {date}, expected YYYY-MM-DD")))?;

        let window = self
            .policy
            .opening_hours
            .window(date)
            .ok_or_else(|| BookingError::Validation(format!("no opening window on {date}")))?;

        let courts = self.court_repo.list_active(filter).await.map_err(|err| {
            error!(db_error = ?err, "slots: failed to list courts");
            BookingError::Internal(err)
        })?;

        if courts.is_empty() {
            info!(%date, "slots: no active courts match the filter");
            return Ok(Vec::new());
        }

        let court_ids = courts.iter().map(|court| court.id).collect::<Vec<_>>();
        let bookings = self
            .booking_repo
            .list_slot_holding_overlapping(court_ids, window)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "slots: failed to load bookings");
                BookingError::Internal(err)
            })?;
        let blocked_slots = self
            .blocked_slot_repo
            .list_overlapping(window)
            .await
            .map_err(|err| {
                error!(db_error = ?err, "slots: failed to load blocked slots");
                BookingError::Internal(err)
            })?;

        let grids = courts
            .iter()
            .map(|court| {
                let court_bookings = bookings
                    .iter()
                    .filter(|booking| booking.court_id == court.id)
                    .cloned()
                    .collect::<Vec<_>>();
                let court_blocks = blocked_slots
                    .iter()
                    .filter(|block| block.applies_to(court.id))
                    .cloned()
                    .collect::<Vec<_>>();

                build_slot_grid(
                    self.policy.slot_layout,
                    &self.policy.opening_hours,
                    SlotGridInput {
                        court,
                        date,
                        now,
                        requesting_user,
                        bookings: &court_bookings,
                        blocked_slots: &court_blocks,
                    },
                )
            })
            .collect::<Vec<_>>();

        info!(%date, court_count = grids.len(), "slots: grid built");
        Ok(grids)
    }
}
