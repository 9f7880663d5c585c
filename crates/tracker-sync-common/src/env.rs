//! Typed lookups of environment settings
//!
//! Every tracker-sync setting is a plain `KEY=value` environment variable
//! (optionally loaded from a `.env` file by the binary). Unset and blank
//! values fall back to the caller's default; values that are present but
//! unparsable are reported instead of being silently replaced.

use crate::error::{CommonError, Result};
use std::str::FromStr;

/// Read a non-blank variable
pub fn var(key: &str) -> Option<String> {
    std::env::var(key)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Read and parse a variable, falling back to `default` when unset
pub fn var_or<T: FromStr>(key: &str, default: T) -> Result<T> {
    match var(key) {
        Some(raw) => raw
            .parse()
            .map_err(|_| CommonError::invalid_setting(key, raw)),
        None => Ok(default),
    }
}

/// Read a boolean flag
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off` in any case.
pub fn flag(key: &str, default: bool) -> Result<bool> {
    match var(key) {
        Some(raw) => parse_flag(&raw).ok_or_else(|| CommonError::invalid_setting(key, raw)),
        None => Ok(default),
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
