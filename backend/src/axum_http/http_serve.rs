use crate::{
    auth::JwtSecret,
    axum_http::{default_routers, routers},
    config::config_model::DotEnvyConfig,
    usecases::{
        payment_gateway::StripePaymentGateway,
        reservations::{ReservationStrategy, SlotReserver},
        retry::ConflictRetry,
    },
};
use anyhow::Result;
use axum::{
    Extension, Router,
    http::{
        Method,
        header::{AUTHORIZATION, CONTENT_TYPE},
    },
    routing::get,
};
use crates::{
    domain::value_objects::booking_policy::BookingPolicy,
    infra::{
        cache::processed_events::ProcessedEventCache,
        db::{postgres::postgres_connection::PgPoolSquad, repositories::bookings::BookingPostgres},
        notifications::tracing_notifier::TracingBookingNotifier,
    },
    payments::stripe_client::StripeClient,
};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower_http::{
    cors::{Any, CorsLayer},
    limit::RequestBodyLimitLayer,
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::{error, info};

/// Process-wide collaborators shared by every router.
#[derive(Clone)]
pub struct AppServices {
    pub db_pool: Arc<PgPoolSquad>,
    pub gateway: Arc<StripePaymentGateway>,
    pub notifier: Arc<TracingBookingNotifier>,
    pub processed_events: Arc<ProcessedEventCache>,
    pub policy: BookingPolicy,
    pub retry: ConflictRetry,
    pub strategy: ReservationStrategy,
}

impl AppServices {
    pub fn new(config: &DotEnvyConfig, db_pool: Arc<PgPoolSquad>) -> Self {
        let stripe_client = StripeClient::new(
            config.stripe.secret_key.clone(),
            config.stripe.webhook_secret.clone(),
        );

        Self {
            db_pool,
            gateway: Arc::new(StripePaymentGateway::new(
                stripe_client,
                config.stripe.currency.clone(),
            )),
            notifier: Arc::new(TracingBookingNotifier),
            processed_events: Arc::new(ProcessedEventCache::new(config.event_cache.clone())),
            policy: config.booking_policy.clone(),
            retry: ConflictRetry::new(
                config.retry.max_attempts,
                config.retry.base_delay_ms,
                config.retry.max_delay_ms,
            ),
            strategy: config.reservation_strategy,
        }
    }

    pub fn slot_reserver(&self, booking_repo: Arc<BookingPostgres>) -> SlotReserver<BookingPostgres> {
        SlotReserver::new(booking_repo, self.strategy, self.retry.clone())
    }
}

pub async fn start(config: Arc<DotEnvyConfig>, db_pool: Arc<PgPoolSquad>) -> Result<()> {
    let services = AppServices::new(&config, db_pool);

    let app = Router::new()
        .fallback(default_routers::not_found)
        .nest("/api/v1/slots", routers::slots::routes(&services))
        .nest("/api/v1/bookings", routers::bookings::routes(&services))
        .nest("/api/v1/wallet", routers::wallet::routes(&services))
        .nest("/api/v1/payments", routers::payments::routes(&services))
        .nest("/api/v1/admin", routers::admin::routes(&services))
        .route("/api/v1/health-check", get(default_routers::health_check))
        .layer(Extension(JwtSecret(config.auth.jwt_secret.clone())))
        .layer(TimeoutLayer::new(Duration::from_secs(
            config.backend_server.timeout,
        )))
        .layer(RequestBodyLimitLayer::new(
            (config.backend_server.body_limit * 1024 * 1024).try_into()?,
        ))
        .layer(
            CorsLayer::new()
                .allow_methods([Method::GET, Method::POST])
                .allow_headers([AUTHORIZATION, CONTENT_TYPE])
                .allow_origin(Any),
        )
        .layer(TraceLayer::new_for_http());

    let addr = SocketAddr::from(([0, 0, 0, 0], config.backend_server.port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = config.backend_server.port, "backend: server is running");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "backend: failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                error!(error = %err, "backend: failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("backend: received ctrl+C signal"),
        _ = terminate => info!("backend: received terminate signal"),
    }
}
