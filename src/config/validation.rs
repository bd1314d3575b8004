use crate::config::types::{Config, CrawlerConfig, HttpConfig};
use crate::ConfigError;

const MAX_WORKERS: usize = 1024;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_http_config(&config.http)?;
    Ok(())
}

/// Validates crawler configuration
pub fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("downloaders", config.downloaders),
        ("extractors", config.extractors),
        ("per-host", config.per_host),
    ] {
        if value < 1 || value > MAX_WORKERS {
            return Err(ConfigError::Validation(format!(
                "{} must be between 1 and {}, got {}",
                name, MAX_WORKERS, value
            )));
        }
    }

    if config.close_timeout_ms < 1 {
        return Err(ConfigError::Validation(
            "close-timeout-ms must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates HTTP configuration
fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs < 1 || config.timeout_secs > 600 {
        return Err(ConfigError::Validation(format!(
            "timeout-secs must be between 1 and 600, got {}",
            config.timeout_secs
        )));
    }

    Ok(())
}
