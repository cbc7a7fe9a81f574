use crate::app_config::{AppConfig, Environment};
use crate::ConfigError;

/// Load application configuration from environment variables.
///
/// Calls `dotenvy::dotenv().ok()` to load `.env` files before reading env vars.
///
/// # Errors
///
/// Returns `ConfigError` if a value is malformed or the combination is invalid.
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
/// Returns `ConfigError` if a value is malformed or the combination is invalid.
pub fn load_app_config_from_env() -> Result<AppConfig, ConfigError> {
    build_app_config(|key| std::env::var(key))
}

/// Build application configuration using the provided env-var lookup function.
fn build_app_config<F>(lookup: F) -> Result<AppConfig, ConfigError>
where
    F: Fn(&str) -> Result<String, std::env::VarError>,
{
    use std::net::SocketAddr;
    use std::path::PathBuf;

    let or_default = |var: &str, default: &str| -> String {
        lookup(var).unwrap_or_else(|_| default.to_string())
    };

    let invalid = |var: &str, reason: String| ConfigError::InvalidEnvVar {
        var: var.to_string(),
        reason,
    };

    let parse_u32 = |var: &str, default: &str| -> Result<u32, ConfigError> {
        or_default(var, default)
            .parse::<u32>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_u64 = |var: &str, default: &str| -> Result<u64, ConfigError> {
        or_default(var, default)
            .parse::<u64>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_usize = |var: &str, default: &str| -> Result<usize, ConfigError> {
        or_default(var, default)
            .parse::<usize>()
            .map_err(|e| invalid(var, e.to_string()))
    };

    let parse_bool = |var: &str, default: &str| -> Result<bool, ConfigError> {
        match or_default(var, default).trim().to_lowercase().as_str() {
            "true" | "1" | "yes" => Ok(true),
            "false" | "0" | "no" => Ok(false),
            other => Err(invalid(var, format!("expected a boolean, got '{other}'"))),
        }
    };

    let env = parse_environment(&or_default("GROCERY_ENV", "development"))?;

    let bind_addr = or_default("GROCERY_BIND_ADDR", "0.0.0.0:3000")
        .parse::<SocketAddr>()
        .map_err(|e| invalid("GROCERY_BIND_ADDR", e.to_string()))?;
    let log_level = or_default("GROCERY_LOG_LEVEL", "info");
    let stores_path = PathBuf::from(or_default("GROCERY_STORES_PATH", "./config/stores.yaml"));
    let cors_origins = or_default("GROCERY_CORS_ORIGINS", "")
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect();

    let webdriver_url = or_default("GROCERY_WEBDRIVER_URL", "http://localhost:4444");
    if !(webdriver_url.starts_with("http://") || webdriver_url.starts_with("https://")) {
        return Err(invalid(
            "GROCERY_WEBDRIVER_URL",
            format!("expected an http(s) URL, got '{webdriver_url}'"),
        ));
    }
    let webdriver_token = lookup("GROCERY_WEBDRIVER_TOKEN")
        .ok()
        .filter(|t| !t.trim().is_empty());
    let browser_headless = parse_bool("GROCERY_BROWSER_HEADLESS", "true")?;

    let scraper_user_agent = or_default(
        "GROCERY_SCRAPER_USER_AGENT",
        "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36",
    );
    let scraper_request_timeout_secs = parse_u64("GROCERY_SCRAPER_REQUEST_TIMEOUT_SECS", "30")?;
    let scraper_inter_request_delay_ms =
        parse_u64("GROCERY_SCRAPER_INTER_REQUEST_DELAY_MS", "1000")?;
    let scraper_max_retries = parse_u32("GROCERY_SCRAPER_MAX_RETRIES", "3")?;
    let scraper_retry_backoff_base_secs =
        parse_u64("GROCERY_SCRAPER_RETRY_BACKOFF_BASE_SECS", "2")?;

    let challenge_timeout_secs = parse_u64("GROCERY_CHALLENGE_TIMEOUT_SECS", "30")?;
    let challenge_poll_interval_ms = parse_u64("GROCERY_CHALLENGE_POLL_INTERVAL_MS", "2000")?;
    let source_timeout_secs = parse_u64("GROCERY_SOURCE_TIMEOUT_SECS", "180")?;
    let max_results = parse_usize("GROCERY_MAX_RESULTS", "100")?;

    if challenge_poll_interval_ms == 0 {
        return Err(ConfigError::Validation(
            "GROCERY_CHALLENGE_POLL_INTERVAL_MS must be greater than zero".to_string(),
        ));
    }
    if max_results == 0 {
        return Err(ConfigError::Validation(
            "GROCERY_MAX_RESULTS must be greater than zero".to_string(),
        ));
    }
    if source_timeout_secs > 0 && source_timeout_secs < challenge_timeout_secs {
        return Err(ConfigError::Validation(format!(
            "GROCERY_SOURCE_TIMEOUT_SECS ({source_timeout_secs}) must not be shorter than \
             GROCERY_CHALLENGE_TIMEOUT_SECS ({challenge_timeout_secs})"
        )));
    }

    Ok(AppConfig {
        env,
        bind_addr,
        log_level,
        stores_path,
        cors_origins,
        webdriver_url,
        webdriver_token,
        browser_headless,
        scraper_user_agent,
        scraper_request_timeout_secs,
        scraper_inter_request_delay_ms,
        scraper_max_retries,
        scraper_retry_backoff_base_secs,
        challenge_timeout_secs,
        challenge_poll_interval_ms,
        source_timeout_secs,
        max_results,
    })
}

/// Parse a string into an `Environment` variant.
fn parse_environment(s: &str) -> Result<Environment, ConfigError> {
    match s {
        "development" => Ok(Environment::Development),
        "test" => Ok(Environment::Test),
        "production" => Ok(Environment::Production),
        other => Err(ConfigError::InvalidEnvVar {
            var: "GROCERY_ENV".to_string(),
            reason: format!("unknown environment '{other}'"),
        }),
    }
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
