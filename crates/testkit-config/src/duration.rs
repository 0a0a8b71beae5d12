//! Duration parsing utilities.

use crate::error::ConfigError;
use std::time::Duration;

/// Parse a duration string like "1h", "30m", "300s", "250ms" or "300".
/// Supports:
/// - Plain numbers (interpreted as seconds): "300"
/// - Milliseconds suffix: "250ms"
/// - Seconds suffix: "300s"
/// - Minutes suffix: "30m"
/// - Hours suffix: "1h"
pub fn parse_duration(s: &str) -> Result<Duration, ConfigError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(invalid(s, "empty duration string"));
    }

    if let Some(num_str) = s.strip_suffix("ms") {
        return parse_number(num_str, s).map(Duration::from_millis);
    }
    if let Some(num_str) = s.strip_suffix('h') {
        return scaled(parse_number(num_str, s)?, 3600, s);
    }
    if let Some(num_str) = s.strip_suffix('m') {
        return scaled(parse_number(num_str, s)?, 60, s);
    }
    if let Some(num_str) = s.strip_suffix('s') {
        return parse_number(num_str, s).map(Duration::from_secs);
    }

    // No suffix - treat as seconds
    parse_number(s, s).map(Duration::from_secs)
}

fn parse_number(num_str: &str, original: &str) -> Result<u64, ConfigError> {
    num_str
        .trim()
        .parse()
        .map_err(|_| invalid(original, "expected a non-negative integer with an optional ms/s/m/h suffix"))
}

fn scaled(value: u64, seconds_per_unit: u64, original: &str) -> Result<Duration, ConfigError> {
    value
        .checked_mul(seconds_per_unit)
        .map(Duration::from_secs)
        .ok_or_else(|| invalid(original, "duration overflows"))
}

fn invalid(value: &str, reason: &str) -> ConfigError {
    ConfigError::InvalidField {
        field: format!("duration '{value}'"),
        reason: reason.to_string(),
    }
}
