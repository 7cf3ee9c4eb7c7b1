use std::env;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub event_buffer_size: usize,
    pub assumed_speed_kmh: f64,
    pub resync_backoff_start_ms: u64,
    pub resync_backoff_cap_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            assumed_speed_kmh: parse_or_default("ASSUMED_SPEED_KMH", 30.0)?,
            resync_backoff_start_ms: parse_or_default("RESYNC_BACKOFF_START_MS", 1_000)?,
            resync_backoff_cap_ms: parse_or_default("RESYNC_BACKOFF_CAP_MS", 30_000)?,
        })
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            http_port: 3000,
            log_level: "info".to_string(),
            event_buffer_size: 1024,
            assumed_speed_kmh: 30.0,
            resync_backoff_start_ms: 1_000,
            resync_backoff_cap_ms: 30_000,
        }
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
