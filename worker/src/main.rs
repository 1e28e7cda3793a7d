use anyhow::Result;
use crates::{
    domain::repositories::{bookings::BookingRepository, notifications::BookingNotifier},
    infra::{
        db::{
            postgres::postgres_connection::{self, PoolOptions},
            repositories::bookings::BookingPostgres,
        },
        notifications::tracing_notifier::TracingBookingNotifier,
    },
};
use std::sync::Arc;
use tokio::sync::{RwLock, watch};
use tracing::{error, info};
use worker::{
    axum_http, config, services::worker_loop, usecases::booking_sweeps::BookingSweepUseCase,
};

#[tokio::main]
async fn main() -> Result<()> {
    if let Err(error) = run().await {
        error!("Worker exited with error: {:#}", error);
        std::process::exit(1);
    }
    Ok(())
}

async fn run() -> Result<()> {
    dotenvy::dotenv().ok();
    crates::observability::init_observability("worker")?;

    let dotenvy_env = Arc::new(config::config_loader::load()?);
    info!("ENV has been loaded");

    let pool_options = PoolOptions {
        max_size: dotenvy_env.database.max_connections,
        ..PoolOptions::default()
    };
    let postgres_pool =
        postgres_connection::establish_connection(&dotenvy_env.database.url, &pool_options)?;
    info!("Postgres connection has been established");

    let db_pool_arc = Arc::new(postgres_pool);

    let booking_repository: Arc<dyn BookingRepository + Send + Sync> =
        Arc::new(BookingPostgres::new(Arc::clone(&db_pool_arc)));
    let notifier: Arc<dyn BookingNotifier + Send + Sync> = Arc::new(TracingBookingNotifier);

    let sweep_usecase = Arc::new(BookingSweepUseCase::new(
        booking_repository,
        notifier,
        dotenvy_env.sweeps.policy.clone(),
        dotenvy_env.sweeps.reminder_lead,
    ));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let last_sweep: worker_loop::LastSweep = Arc::new(RwLock::new(None));

    let sweep_loop = tokio::spawn(worker_loop::run_sweep_loop(
        sweep_usecase,
        dotenvy_env.sweeps.interval,
        Arc::clone(&last_sweep),
        shutdown_rx.clone(),
    ));

    let health_server = tokio::spawn(axum_http::http_serve::start(
        Arc::clone(&dotenvy_env),
        last_sweep,
        shutdown_rx,
    ));

    tokio::spawn(async move {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!(error = %err, "worker: failed to install CTRL+C handler");
            std::future::pending::<()>().await;
        }
        info!("worker: received ctrl+C signal");
        let _ = shutdown_tx.send(true);
    });

    tokio::select! {
        result = sweep_loop => result??,
        result = health_server => result??,
    };
    Ok(())
}
