//! Timeout grammar for the `timeout` command.
//!
//! A timeout is one or more `<unsigned integer><unit>` groups with units taken
//! from `h`, `m`, `s` in that order, each unit at most once: `1h15m`, `24h`,
//! `30m`, `60s`, `10h30m15s`. Zero totals, signs, fractions and bare numbers
//! are rejected.

use crate::error::DurationError;
use once_cell::sync::Lazy;
use regex::Regex;

static TIMEOUT_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:([0-9]+)h)?(?:([0-9]+)m)?(?:([0-9]+)s)?$").expect("Invalid regex")
});

const UNIT_SECONDS: [u64; 3] = [3600, 60, 1];

/// Parse a timeout string into seconds
pub fn parse_timeout(input: &str) -> Result<u64, DurationError> {
    let input = input.trim();

    if input.is_empty() {
        return Err(DurationError::Empty);
    }
    if input.starts_with('-') {
        return Err(DurationError::Negative);
    }
    if input.chars().all(|c| c.is_ascii_digit()) {
        return Err(DurationError::MissingUnit);
    }

    let caps = TIMEOUT_PATTERN
        .captures(input)
        .ok_or_else(|| DurationError::Malformed(input.to_string()))?;

    let mut total: u64 = 0;
    for (group, unit) in UNIT_SECONDS.iter().enumerate() {
        if let Some(amount) = caps.get(group + 1) {
            let amount: u64 = amount
                .as_str()
                .parse()
                .map_err(|_| DurationError::Overflow)?;
            total = amount
                .checked_mul(*unit)
                .and_then(|secs| total.checked_add(secs))
                .ok_or(DurationError::Overflow)?;
        }
    }

    if total == 0 {
        return Err(DurationError::Zero);
    }

    Ok(total)
}

/// Render seconds in the same grammar `parse_timeout` accepts, e.g. `1h15m`
pub fn format_duration(seconds: u64) -> String {
    if seconds == 0 {
        return "0s".to_string();
    }

    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{hours}h"));
    }
    if minutes > 0 {
        out.push_str(&format!("{minutes}m"));
    }
    if secs > 0 {
        out.push_str(&format!("{secs}s"));
    }
    out
}
