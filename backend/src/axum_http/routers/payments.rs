use std::sync::Arc;

use axum::{
    Json, Router,
    body::Bytes,
    extract::State,
    http::HeaderMap,
    routing::post,
};
use chrono::Utc;
use crates::{
    domain::value_objects::payment_events::WebhookAck,
    infra::{
        db::repositories::{
            bookings::BookingPostgres, courts::CourtPostgres, credit_packs::CreditPackPostgres,
            payment_events::PaymentEventPostgres, users::UserPostgres, wallet::WalletPostgres,
        },
        notifications::tracing_notifier::TracingBookingNotifier,
    },
};
use tracing::warn;

use crate::{
    axum_http::{
        error_responses::{AppError, AppResult},
        http_serve::AppServices,
    },
    usecases::{
        payment_events::{PaymentEventRepositories, PaymentEventUseCase},
        payment_gateway::StripePaymentGateway,
    },
};

pub const STRIPE_SIGNATURE_HEADER: &str = "stripe-signature";

pub type PaymentEvents = PaymentEventUseCase<
    BookingPostgres,
    WalletPostgres,
    UserPostgres,
    CourtPostgres,
    CreditPackPostgres,
    PaymentEventPostgres,
    StripePaymentGateway,
    TracingBookingNotifier,
>;

pub fn routes(services: &AppServices) -> Router {
    let db_pool = &services.db_pool;
    let bookings = Arc::new(BookingPostgres::new(Arc::clone(db_pool)));

    let payment_events_usecase = PaymentEventUseCase::new(
        PaymentEventRepositories {
            bookings: Arc::clone(&bookings),
            wallet: Arc::new(WalletPostgres::new(Arc::clone(db_pool))),
            users: Arc::new(UserPostgres::new(Arc::clone(db_pool))),
            courts: Arc::new(CourtPostgres::new(Arc::clone(db_pool))),
            credit_packs: Arc::new(CreditPackPostgres::new(Arc::clone(db_pool))),
            payment_events: Arc::new(PaymentEventPostgres::new(Arc::clone(db_pool))),
        },
        Arc::clone(&services.gateway),
        Arc::clone(&services.notifier),
        services.slot_reserver(bookings),
        Arc::clone(&services.processed_events),
        services.retry.clone(),
    );

    Router::new()
        .route("/stripe/webhook", post(stripe_webhook))
        .with_state(Arc::new(payment_events_usecase))
}

/// Signed by the gateway, so no bearer token; the raw body is needed for verification.
pub async fn stripe_webhook(
    State(payment_events_usecase): State<Arc<PaymentEvents>>,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<WebhookAck>> {
    let signature = headers
        .get(STRIPE_SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| {
            warn!("payments: webhook without stripe-signature header");
            AppError::BadRequest("missing stripe-signature header".to_string())
        })?;

    let ack = payment_events_usecase
        .handle_stripe_webhook(&body, signature, Utc::now())
        .await?;

    Ok(Json(ack))
}
