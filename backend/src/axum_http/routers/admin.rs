use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::post,
};
use chrono::Utc;
use crates::{
    domain::value_objects::bookings::CancellationReceipt,
    infra::db::repositories::{bookings::BookingPostgres, wallet::WalletPostgres},
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{
        error_responses::{AppError, AppResult},
        http_serve::AppServices,
        routers::bookings::Cancellations,
    },
    usecases::cancellations::CancellationUseCase,
};

pub fn routes(services: &AppServices) -> Router {
    let cancellations = CancellationUseCase::new(
        Arc::new(BookingPostgres::new(Arc::clone(&services.db_pool))),
        Arc::new(WalletPostgres::new(Arc::clone(&services.db_pool))),
        Arc::clone(&services.gateway),
        Arc::clone(&services.notifier),
        services.policy.clone(),
        services.retry.clone(),
    );

    Router::new()
        .route("/bookings/:booking_id/retry-refund", post(retry_refund))
        .with_state(Arc::new(cancellations))
}

pub async fn retry_refund(
    State(cancellations): State<Arc<Cancellations>>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<CancellationReceipt>> {
    if !auth.is_admin() {
        warn!(user_id = %auth.user_id, %booking_id, "admin: refund retry refused for non-admin");
        return Err(AppError::Forbidden);
    }

    info!(admin_id = %auth.user_id, %booking_id, "admin: retrying refund");
    let receipt = cancellations.retry_refund(booking_id, Utc::now()).await?;
    Ok(Json(receipt))
}
