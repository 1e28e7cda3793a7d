use super::config_model::{Database, DotEnvyConfig, Sweeps, WorkerServer};
use anyhow::{Context, Result, anyhow};
use crates::domain::value_objects::booking_policy::BookingPolicy;
use std::time::Duration;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let get = |key: &str| {
        lookup(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    };

    let worker_server = WorkerServer {
        port: get("SERVER_PORT_WORKER")
            .unwrap_or_else(|| "8081".to_string())
            .parse()
            .context("SERVER_PORT_WORKER is invalid")?,
        timeout: get("SERVER_TIMEOUT")
            .unwrap_or_else(|| "30".to_string())
            .parse()
            .context("SERVER_TIMEOUT is invalid")?,
    };

    let database = Database {
        url: get("DATABASE_URL").ok_or_else(|| anyhow!("DATABASE_URL is missing"))?,
        max_connections: get("WORKER_DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|| "2".to_string())
            .parse()
            .context("WORKER_DATABASE_MAX_CONNECTIONS is invalid")?,
    };

    let interval_secs: u64 = get("SWEEP_INTERVAL_SECS")
        .unwrap_or_else(|| "60".to_string())
        .parse()
        .context("SWEEP_INTERVAL_SECS is invalid")?;
    if interval_secs == 0 {
        return Err(anyhow!("SWEEP_INTERVAL_SECS must be positive"));
    }

    let reminder_lead_hours: i64 = get("REMINDER_LEAD_HOURS")
        .unwrap_or_else(|| "24".to_string())
        .parse()
        .context("REMINDER_LEAD_HOURS is invalid")?;

    let mut policy = BookingPolicy::default();
    if let Some(ttl) = get("BOOKING_PENDING_TTL_MINUTES") {
        policy.pending_ttl_minutes = ttl
            .parse()
            .context("BOOKING_PENDING_TTL_MINUTES is invalid")?;
    }

    let sweeps = Sweeps {
        interval: Duration::from_secs(interval_secs),
        reminder_lead: chrono::Duration::hours(reminder_lead_hours.max(0)),
        policy,
    };

    Ok(DotEnvyConfig {
        worker_server,
        database,
        sweeps,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<DotEnvyConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        load_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_need_only_a_database_url() {
        let config = load_with(&[("DATABASE_URL", "postgres://localhost/courtbook")]).unwrap();
        assert_eq!(config.sweeps.interval, Duration::from_secs(60));
        assert_eq!(config.sweeps.reminder_lead, chrono::Duration::hours(24));
        assert_eq!(config.sweeps.policy.pending_ttl_minutes, 15);
    }

    #[test]
    fn missing_database_url_and_zero_interval_are_errors() {
        assert!(load_with(&[]).is_err());
        assert!(load_with(&[
            ("DATABASE_URL", "postgres://localhost/courtbook"),
            ("SWEEP_INTERVAL_SECS", "0"),
        ])
        .is_err());
    }
}
