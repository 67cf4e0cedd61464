use std::env;
use std::time::Duration;

use super::types::{ConfigError, Environment};

pub(super) fn env_optional(key: &str) -> Option<String> {
    env::var(key).ok().map(|value| value.trim().to_string()).filter(|value| !value.is_empty())
}

pub(super) fn env_or_default(key: &str, default: &str) -> String {
    env_optional(key).unwrap_or_else(|| default.to_string())
}

pub(super) fn parse_u16(field: &'static str, value: String) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u32(field: &'static str, value: String) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_u64(field: &'static str, value: String) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidValue { field, value })
}

pub(super) fn parse_millis(field: &'static str, value: String) -> Result<Duration, ConfigError> {
    parse_u64(field, value).map(Duration::from_millis)
}

/// Parses lifetimes written as `90`, `90s`, `30m`, `24h` or `7d`.
pub(super) fn parse_lifetime(field: &'static str, value: String) -> Result<Duration, ConfigError> {
    let raw = value.trim();
    let (digits, unit_seconds) = match raw.chars().last() {
        Some('s') => (&raw[..raw.len() - 1], 1),
        Some('m') => (&raw[..raw.len() - 1], 60),
        Some('h') => (&raw[..raw.len() - 1], 3_600),
        Some('d') => (&raw[..raw.len() - 1], 86_400),
        Some(c) if c.is_ascii_digit() => (raw, 1),
        _ => return Err(ConfigError::InvalidDuration { field, value }),
    };

    let amount: u64 =
        digits.trim().parse().map_err(|_| ConfigError::InvalidDuration { field, value: value.clone() })?;
    if amount == 0 {
        return Err(ConfigError::InvalidDuration { field, value });
    }

    Ok(Duration::from_secs(amount * unit_seconds))
}

pub(super) fn parse_cors_origins(value: Option<String>) -> Vec<String> {
    let Some(raw) = value else {
        return Vec::new();
    };

    raw.split(',')
        .map(|item| item.trim().to_string())
        .filter(|item| !item.is_empty() && item != "*")
        .collect()
}

pub(super) fn parse_bool(value: &str) -> bool {
    matches!(value, "1" | "true" | "TRUE" | "yes" | "YES" | "on" | "ON")
}

pub(super) fn parse_environment(value: Option<String>) -> Environment {
    match value.as_deref().map(|item| item.to_lowercase()) {
        Some(ref val) if val == "production" || val == "prod" => Environment::Production,
        Some(ref val) if val == "staging" => Environment::Staging,
        Some(ref val) if val == "test" || val == "testing" => Environment::Test,
        _ => Environment::Development,
    }
}
