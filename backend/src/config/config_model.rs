use std::time::Duration;

use crates::{
    domain::value_objects::booking_policy::BookingPolicy,
    infra::cache::processed_events::ProcessedEventCacheOptions,
};

use crate::usecases::reservations::ReservationStrategy;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub backend_server: BackendServer,
    pub database: Database,
    pub auth: Auth,
    pub stripe: Stripe,
    pub booking_policy: BookingPolicy,
    pub retry: Retry,
    pub reservation_strategy: ReservationStrategy,
    pub event_cache: ProcessedEventCacheOptions,
}

#[derive(Debug, Clone)]
pub struct BackendServer {
    pub port: u16,
    /// Megabytes.
    pub body_limit: u64,
    /// Seconds.
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Auth {
    pub jwt_secret: String,
}

#[derive(Debug, Clone)]
pub struct Stripe {
    pub secret_key: String,
    pub webhook_secret: String,
    pub currency: String,
}

#[derive(Debug, Clone, Copy)]
pub struct Retry {
    pub max_attempts: usize,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}
