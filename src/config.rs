use std::env;

use anyhow::{Context, anyhow};

use crate::scheduling::TransitionPolicy;

/// Upper bound for `TOKEN_TTL_HOURS` (30 days).
pub const MAX_TOKEN_TTL_HOURS: i64 = 24 * 30;
/// Upper bound for `DOUBLE_BOOKING_WINDOW_MINUTES` (one day).
pub const MAX_DOUBLE_BOOKING_WINDOW_MINUTES: i64 = 24 * 60;

#[derive(Clone, Debug)]
pub struct DevUser {
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug)]
pub struct Config {
    /// Unset means the in-memory store.
    pub database_url: Option<String>,
    pub bind_addr: String,
    pub jwt_secret: String,
    pub token_ttl_hours: i64,
    pub transition_policy: TransitionPolicy,
    pub double_booking_window_minutes: Option<i64>,
    /// Login seeded into the in-memory store.
    pub dev_user: Option<DevUser>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let database_url = var("DATABASE_URL").filter(|s| !s.trim().is_empty());
        let bind_addr = var("BIND_ADDR").unwrap_or_else(|| "127.0.0.1:8080".to_string());
        let jwt_secret = var("JWT_SECRET")
            .filter(|s| !s.is_empty())
            .context("JWT_SECRET must be set")?;

        let token_ttl_hours = match var("TOKEN_TTL_HOURS") {
            Some(s) => {
                let hours = s
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("TOKEN_TTL_HOURS is not a number: {s:?}"))?;
                if !(1..=MAX_TOKEN_TTL_HOURS).contains(&hours) {
                    return Err(anyhow!(
                        "TOKEN_TTL_HOURS must be between 1 and {MAX_TOKEN_TTL_HOURS}, got {hours}"
                    ));
                }
                hours
            }
            None => 8,
        };

        let transition_policy = match var("APPOINTMENT_TRANSITIONS") {
            Some(s) => s.parse::<TransitionPolicy>().map_err(|e| anyhow!(e))?,
            None => TransitionPolicy::default(),
        };

        let double_booking_window_minutes = match var("DOUBLE_BOOKING_WINDOW_MINUTES") {
            Some(s) => {
                let minutes = s
                    .trim()
                    .parse::<i64>()
                    .with_context(|| format!("DOUBLE_BOOKING_WINDOW_MINUTES is not a number: {s:?}"))?;
                if minutes > MAX_DOUBLE_BOOKING_WINDOW_MINUTES {
                    return Err(anyhow!(
                        "DOUBLE_BOOKING_WINDOW_MINUTES must be at most {MAX_DOUBLE_BOOKING_WINDOW_MINUTES}, got {minutes}"
                    ));
                }
                (minutes > 0).then_some(minutes)
            }
            None => None,
        };

        let dev_user = match (var("DEV_USER_EMAIL"), var("DEV_USER_PASSWORD")) {
            (Some(email), Some(password)) => Some(DevUser { email, password }),
            _ => None,
        };

        Ok(Self {
            database_url,
            bind_addr,
            jwt_secret,
            token_ttl_hours,
            transition_policy,
            double_booking_window_minutes,
            dev_user,
        })
    }
}
