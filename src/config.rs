use anyhow::{Context, Result};
use chrono::FixedOffset;

use crate::records::LocalZone;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub server_host: String,
    pub server_port: u16,
    pub database_max_connections: u32,
    /// Zone whose midnights delimit a "local" calendar day. The host zone
    /// (daylight saving aware) unless `RECORD_UTC_OFFSET` pins a fixed offset
    /// such as `+08:00`.
    pub record_zone: LocalZone,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            server_host: optional("SERVER_HOST", "0.0.0.0"),
            server_port: optional("SERVER_PORT", "8080")
                .parse()
                .context("SERVER_PORT must be a valid port number")?,
            database_max_connections: optional("DATABASE_MAX_CONNECTIONS", "10")
                .parse()
                .context("DATABASE_MAX_CONNECTIONS must be a positive integer")?,
            record_zone: record_zone(std::env::var("RECORD_UTC_OFFSET").ok())?,
        })
    }
}

fn record_zone(raw: Option<String>) -> Result<LocalZone> {
    match raw {
        Some(raw) if !raw.trim().is_empty() => Ok(LocalZone::Fixed(parse_offset(&raw)?)),
        _ => Ok(LocalZone::System),
    }
}

fn parse_offset(raw: &str) -> Result<FixedOffset> {
    raw.trim()
        .parse::<FixedOffset>()
        .with_context(|| format!("RECORD_UTC_OFFSET must look like +08:00 or -05:30, got {raw:?}"))
}

fn required(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("missing required env var: {key}"))
}

fn optional(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}
