use std::{str::FromStr, time::Duration};

use anyhow::{Context, Result, anyhow};
use chrono::{FixedOffset, NaiveTime};
use crates::{
    domain::value_objects::{
        booking_policy::BookingPolicy,
        slot_grid::{OpeningHours, SlotLayout},
    },
    infra::cache::processed_events::ProcessedEventCacheOptions,
};

use super::config_model::{Auth, BackendServer, Database, DotEnvyConfig, Retry, Stripe};
use crate::usecases::reservations::ReservationStrategy;

pub fn load() -> Result<DotEnvyConfig> {
    dotenvy::dotenv().ok();
    load_from(|key| std::env::var(key).ok())
}

/// Builds the config from any key lookup; required keys error instead of panicking.
pub fn load_from<F>(lookup: F) -> Result<DotEnvyConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let env = Env { lookup };

    let backend_server = BackendServer {
        port: env.parse_or("SERVER_PORT_BACKEND", 8080)?,
        body_limit: env.parse_or("SERVER_BODY_LIMIT", 1)?,
        timeout: env.parse_or("SERVER_TIMEOUT", 30)?,
    };

    let database = Database {
        url: env.required("DATABASE_URL")?,
        max_connections: env.parse_or("DATABASE_MAX_CONNECTIONS", 10)?,
        connection_timeout: Duration::from_secs(
            env.parse_or("DATABASE_CONNECTION_TIMEOUT_SECS", 5)?,
        ),
    };

    let auth = Auth {
        jwt_secret: env.required("AUTH_JWT_SECRET")?,
    };

    let stripe = Stripe {
        secret_key: env.required("STRIPE_SECRET_KEY")?,
        webhook_secret: env.required("STRIPE_WEBHOOK_SECRET")?,
        currency: env
            .optional("STRIPE_CURRENCY")
            .unwrap_or_else(|| "eur".to_string())
            .to_ascii_lowercase(),
    };

    let defaults = BookingPolicy::default();
    let utc_offset_minutes: i32 = env.parse_or("CLUB_UTC_OFFSET_MINUTES", 0)?;
    let opening_hours = OpeningHours {
        opens_at: env.time_or("CLUB_OPENS_AT", defaults.opening_hours.opens_at)?,
        closes_at: env.time_or("CLUB_CLOSES_AT", defaults.opening_hours.closes_at)?,
        utc_offset: FixedOffset::east_opt(utc_offset_minutes * 60)
            .ok_or_else(|| anyhow!("CLUB_UTC_OFFSET_MINUTES is out of range"))?,
    };
    if opening_hours.closes_at <= opening_hours.opens_at {
        return Err(anyhow!("CLUB_CLOSES_AT must be after CLUB_OPENS_AT"));
    }

    let slot_layout = match env.optional("SLOT_LAYOUT") {
        Some(value) => SlotLayout::from_str(&value)
            .ok_or_else(|| anyhow!("SLOT_LAYOUT is invalid: {value}"))?,
        None => defaults.slot_layout,
    };

    let booking_policy = BookingPolicy {
        opening_hours,
        slot_layout,
        max_advance_days: env.parse_or("BOOKING_MAX_ADVANCE_DAYS", defaults.max_advance_days)?,
        cancellation_cutoff_hours: env.parse_or(
            "BOOKING_CANCELLATION_CUTOFF_HOURS",
            defaults.cancellation_cutoff_hours,
        )?,
        pending_ttl_minutes: env
            .parse_or("BOOKING_PENDING_TTL_MINUTES", defaults.pending_ttl_minutes)?,
    };

    let retry = Retry {
        max_attempts: env.parse_or("RETRY_MAX_ATTEMPTS", 5)?,
        base_delay_ms: env.parse_or("RETRY_BASE_DELAY_MS", 25)?,
        max_delay_ms: env.parse_or("RETRY_MAX_DELAY_MS", 400)?,
    };
    if retry.max_attempts == 0 {
        return Err(anyhow!("RETRY_MAX_ATTEMPTS must be at least 1"));
    }

    let reservation_strategy = match env.optional("RESERVATION_STRATEGY") {
        Some(value) => ReservationStrategy::from_str(&value)
            .ok_or_else(|| anyhow!("RESERVATION_STRATEGY is invalid: {value}"))?,
        None => ReservationStrategy::default(),
    };

    let cache_defaults = ProcessedEventCacheOptions::default();
    let event_cache = ProcessedEventCacheOptions {
        max_entries: env.parse_or("EVENT_CACHE_MAX_ENTRIES", cache_defaults.max_entries)?,
        max_key_bytes: env.parse_or("EVENT_CACHE_MAX_KEY_BYTES", cache_defaults.max_key_bytes)?,
        ttl: Duration::from_secs(
            env.parse_or("EVENT_CACHE_TTL_SECS", cache_defaults.ttl.as_secs())?,
        ),
    };

    Ok(DotEnvyConfig {
        backend_server,
        database,
        auth,
        stripe,
        booking_policy,
        retry,
        reservation_strategy,
        event_cache,
    })
}

struct Env<F> {
    lookup: F,
}

impl<F> Env<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    }

    fn required(&self, key: &str) -> Result<String> {
        self.optional(key)
            .ok_or_else(|| anyhow!("{key} is missing"))
    }

    fn parse_or<T>(&self, key: &str, default: T) -> Result<T>
    where
        T: FromStr,
        T::Err: std::error::Error + Send + Sync + 'static,
    {
        match self.optional(key) {
            Some(value) => value
                .parse()
                .with_context(|| format!("{key} is invalid: {value}")),
            None => Ok(default),
        }
    }

    fn time_or(&self, key: &str, default: NaiveTime) -> Result<NaiveTime> {
        match self.optional(key) {
            Some(value) => NaiveTime::parse_from_str(&value, "%H:%M")
                .with_context(|| format!("{key} must be HH:MM, got {value}")),
            None => Ok(default),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn required() -> HashMap<&'static str, &'static str> {
        HashMap::from([
            ("DATABASE_URL", "postgres://localhost:5432/courtbook"),
            ("AUTH_JWT_SECRET", "supersecretjwtsecretforunittesting123"),
            ("STRIPE_SECRET_KEY", "sk_test_123"),
            ("STRIPE_WEBHOOK_SECRET", "whsec_123"),
        ])
    }

    fn load_with(vars: HashMap<&'static str, &'static str>) -> Result<DotEnvyConfig> {
        load_from(|key| vars.get(key).map(|value| value.to_string()))
    }

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = load_with(required()).unwrap();

        assert_eq!(config.backend_server.port, 8080);
        assert_eq!(config.stripe.currency, "eur");
        assert_eq!(config.booking_policy, BookingPolicy::default());
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.reservation_strategy, ReservationStrategy::Serializable);
        assert_eq!(config.event_cache.max_entries, 10_000);
    }

    #[test]
    fn missing_required_key_is_an_error() {
        let mut vars = required();
        vars.remove("STRIPE_WEBHOOK_SECRET");

        let err = load_with(vars).unwrap_err();
        assert!(err.to_string().contains("STRIPE_WEBHOOK_SECRET"));
    }

    #[test]
    fn policy_knobs_are_read() {
        let mut vars = required();
        vars.insert("CLUB_OPENS_AT", "07:30");
        vars.insert("CLUB_CLOSES_AT", "23:00");
        vars.insert("CLUB_UTC_OFFSET_MINUTES", "120");
        vars.insert("SLOT_LAYOUT", "fixed");
        vars.insert("BOOKING_CANCELLATION_CUTOFF_HOURS", "12");
        vars.insert("RESERVATION_STRATEGY", "optimistic");

        let config = load_with(vars).unwrap();
        let policy = config.booking_policy;

        assert_eq!(policy.opening_hours.opens_at, NaiveTime::from_hms_opt(7, 30, 0).unwrap());
        assert_eq!(policy.opening_hours.utc_offset.local_minus_utc(), 7200);
        assert_eq!(policy.slot_layout, SlotLayout::FixedStarts);
        assert_eq!(policy.cancellation_cutoff_hours, 12);
        assert_eq!(config.reservation_strategy, ReservationStrategy::Optimistic);
    }

    #[test]
    fn malformed_values_are_rejected() {
        let mut vars = required();
        vars.insert("SERVER_PORT_BACKEND", "eighty");
        assert!(load_with(vars).is_err());

        let mut vars = required();
        vars.insert("CLUB_OPENS_AT", "22:00");
        vars.insert("CLUB_CLOSES_AT", "08:00");
        assert!(load_with(vars).is_err());

        let mut vars = required();
        vars.insert("SLOT_LAYOUT", "hexagonal");
        assert!(load_with(vars).is_err());
    }
}
