use std::path::PathBuf;

use crate::app_config::{AppConfig, ScanSettings, DEFAULT_USER_AGENT};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value cannot be parsed or fails validation.
pub fn load_app_config() -> Result<AppConfig, ConfigError> {
    dotenvy::dotenv().ok();
    load_app_config_from_env()
}

/// Load application configuration from environment variables already in the process.
///
/// Unlike [`load_app_config`], this does NOT load `.env` files.
///
/// # Errors
///
/// Returns `ConfigError` if a value cannot be parsed or fails validation.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
///
/// Decoupled from the process environment so tests can drive it with a
/// `HashMap` lookup.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .trim()
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let log_level = or_default("MARKETSCAN_LOG_LEVEL", "info");
    let rules_path = lookup("MARKETSCAN_RULES_PATH")
        .ok()
        .filter(|p| !p.trim().is_empty())
        .map(PathBuf::from);

    let scan = ScanSettings {
        request_timeout_secs: parse_u64("MARKETSCAN_REQUEST_TIMEOUT_SECS", "15")?,
        user_agent: or_default("MARKETSCAN_USER_AGENT", DEFAULT_USER_AGENT),
        max_retries: parse_u32("MARKETSCAN_MAX_RETRIES", "3")?,
        retry_backoff_base_ms: parse_u64("MARKETSCAN_RETRY_BACKOFF_BASE_MS", "1000")?,
        retry_backoff_max_ms: parse_u64("MARKETSCAN_RETRY_BACKOFF_MAX_MS", "30000")?,
        block_cooldown_secs: parse_u64("MARKETSCAN_BLOCK_COOLDOWN_SECS", "30")?,
        max_pages: parse_u32("MARKETSCAN_MAX_PAGES", "5")?,
        inter_request_delay_ms: parse_u64("MARKETSCAN_INTER_REQUEST_DELAY_MS", "1000")?,
        channel_capacity: parse_usize("MARKETSCAN_CHANNEL_CAPACITY", "64")?,
    };
    validate_scan_settings(&scan)?;

    Ok(AppConfig {
        log_level,
        rules_path,
        scan,
    })
}

/// Rejects settings that would make a scan unable to make progress.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] naming the first offending setting.
pub fn validate_scan_settings(scan: &ScanSettings) -> Result<(), ConfigError> {
    if scan.max_pages == 0 {
        return Err(ConfigError::Validation(
            "MARKETSCAN_MAX_PAGES must be at least 1".to_string(),
        ));
    }
    if scan.channel_capacity == 0 {
        return Err(ConfigError::Validation(
            "MARKETSCAN_CHANNEL_CAPACITY must be at least 1".to_string(),
        ));
    }
    if scan.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "MARKETSCAN_REQUEST_TIMEOUT_SECS must be at least 1".to_string(),
        ));
    }
    if scan.retry_backoff_max_ms < scan.retry_backoff_base_ms {
        return Err(ConfigError::Validation(format!(
            "MARKETSCAN_RETRY_BACKOFF_MAX_MS ({}) is below MARKETSCAN_RETRY_BACKOFF_BASE_MS ({})",
            scan.retry_backoff_max_ms, scan.retry_backoff_base_ms
        )));
    }
    Ok(())
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
