use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, State},
    http::StatusCode,
    routing::post,
};
use chrono::Utc;
use crates::{
    domain::value_objects::bookings::{
        BookingDto, CancellationReceipt, ChargeIntentDto, SlotRequest,
    },
    infra::{
        db::repositories::{
            blocked_slots::BlockedSlotPostgres, bookings::BookingPostgres, courts::CourtPostgres,
            wallet::WalletPostgres,
        },
        notifications::tracing_notifier::TracingBookingNotifier,
    },
};
use uuid::Uuid;

use crate::{
    auth::AuthUser,
    axum_http::{error_responses::AppResult, http_serve::AppServices},
    usecases::{
        cancellations::CancellationUseCase, payment_gateway::StripePaymentGateway,
        reservations::ReservationUseCase,
    },
};

pub type Reservations = ReservationUseCase<
    CourtPostgres,
    BookingPostgres,
    BlockedSlotPostgres,
    StripePaymentGateway,
    TracingBookingNotifier,
>;
pub type Cancellations =
    CancellationUseCase<BookingPostgres, WalletPostgres, StripePaymentGateway, TracingBookingNotifier>;

#[derive(Clone)]
pub struct BookingsState {
    pub reservations: Arc<Reservations>,
    pub cancellations: Arc<Cancellations>,
}

pub fn routes(services: &AppServices) -> Router {
    let booking_repository = Arc::new(BookingPostgres::new(Arc::clone(&services.db_pool)));

    let reservations = ReservationUseCase::new(
        Arc::new(CourtPostgres::new(Arc::clone(&services.db_pool))),
        Arc::clone(&booking_repository),
        Arc::new(BlockedSlotPostgres::new(Arc::clone(&services.db_pool))),
        Arc::clone(&services.gateway),
        Arc::clone(&services.notifier),
        services.policy.clone(),
        services.retry.clone(),
        services.strategy,
    );
    let cancellations = CancellationUseCase::new(
        booking_repository,
        Arc::new(WalletPostgres::new(Arc::clone(&services.db_pool))),
        Arc::clone(&services.gateway),
        Arc::clone(&services.notifier),
        services.policy.clone(),
        services.retry.clone(),
    );

    Router::new()
        .route("/charge-intents", post(create_charge_intent))
        .route("/credit", post(pay_with_credits))
        .route("/:booking_id/cancel", post(cancel_booking))
        .with_state(BookingsState {
            reservations: Arc::new(reservations),
            cancellations: Arc::new(cancellations),
        })
}

pub async fn create_charge_intent(
    State(state): State<BookingsState>,
    auth: AuthUser,
    Json(request): Json<SlotRequest>,
) -> AppResult<(StatusCode, Json<ChargeIntentDto>)> {
    let intent = state
        .reservations
        .create_charge_intent(auth.user_id, request, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(intent)))
}

pub async fn pay_with_credits(
    State(state): State<BookingsState>,
    auth: AuthUser,
    Json(request): Json<SlotRequest>,
) -> AppResult<(StatusCode, Json<BookingDto>)> {
    let booking = state
        .reservations
        .pay_with_credits(auth.user_id, request, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(booking)))
}

pub async fn cancel_booking(
    State(state): State<BookingsState>,
    auth: AuthUser,
    Path(booking_id): Path<Uuid>,
) -> AppResult<Json<CancellationReceipt>> {
    let receipt = state
        .cancellations
        .cancel_booking(auth.user_id, booking_id, Utc::now())
        .await?;
    Ok(Json(receipt))
}
