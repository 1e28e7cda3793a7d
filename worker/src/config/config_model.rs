use crates::domain::value_objects::booking_policy::BookingPolicy;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct DotEnvyConfig {
    pub worker_server: WorkerServer,
    pub database: Database,
    pub sweeps: Sweeps,
}

#[derive(Debug, Clone)]
pub struct WorkerServer {
    pub port: u16,
    pub timeout: u64,
}

#[derive(Debug, Clone)]
pub struct Database {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Sweeps {
    pub interval: Duration,
    pub reminder_lead: chrono::Duration,
    pub policy: BookingPolicy,
}
