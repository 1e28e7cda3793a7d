use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::get,
};
use chrono::Utc;
use crates::{
    domain::{
        repositories::{
            blocked_slots::BlockedSlotRepository, bookings::BookingRepository,
            courts::CourtRepository,
        },
        value_objects::{courts::CourtFilter, slot_grid::CourtSlotGrid},
    },
    infra::db::repositories::{
        blocked_slots::BlockedSlotPostgres, bookings::BookingPostgres, courts::CourtPostgres,
    },
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{error_responses::AppResult, http_serve::AppServices},
    usecases::slots::SlotGridUseCase,
};

#[derive(Debug, Deserialize)]
pub struct SlotsQuery {
    pub date: String,
    pub court_id: Option<Uuid>,
    pub duration: Option<i32>,
    pub location: Option<String>,
}

pub fn routes(services: &AppServices) -> Router {
    let db_pool = &services.db_pool;
    let slots_usecase = SlotGridUseCase::new(
        Arc::new(CourtPostgres::new(Arc::clone(db_pool))),
        Arc::new(BookingPostgres::new(Arc::clone(db_pool))),
        Arc::new(BlockedSlotPostgres::new(Arc::clone(db_pool))),
        services.policy.clone(),
    );

    Router::new()
        .route("/", get(get_slots_by_date))
        .with_state(Arc::new(slots_usecase))
}

/// Anonymous callers get the same grid without own-booking markers.
pub async fn get_slots_by_date<C, B, BS>(
    State(slots_usecase): State<Arc<SlotGridUseCase<C, B, BS>>>,
    auth: Option<AuthUser>,
    Query(query): Query<SlotsQuery>,
) -> AppResult<Json<Vec<CourtSlotGrid>>>
where
    C: CourtRepository + Send + Sync + 'static,
    B: BookingRepository + Send + Sync + 'static,
    BS: BlockedSlotRepository + Send + Sync + 'static,
{
    let filter = CourtFilter {
        court_id: query.court_id,
        duration_minutes: query.duration,
        location: query.location,
    };

    let grids = slots_usecase
        .get_slots_by_date(
            &query.date,
            filter,
            auth.map(|user| user.user_id),
            Utc::now(),
        )
        .await?;

    Ok(Json(grids))
}
