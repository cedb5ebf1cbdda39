use crate::config::types::{CrawlConfig, OutputFormat};
use crate::ConfigError;

/// Upper bound on the worker pool size
const MAX_WORKERS: usize = 64;

/// Upper bound on fetch attempts per task
const MAX_ATTEMPTS: u32 = 10;

/// Upper bound on redirects followed per request
const MAX_REDIRECTS: usize = 20;

/// Upper bound for any delay expressed in seconds (one day)
const MAX_DELAY_SECS: f64 = 86_400.0;

/// Validates the entire configuration
///
/// A configuration that fails validation is fatal: the run never starts.
pub fn validate(config: &CrawlConfig) -> Result<(), ConfigError> {
    validate_delay("rate_limit", config.rate_limit)?;
    validate_delay("retry_backoff", config.retry_backoff)?;
    validate_user_agent(&config.user_agent)?;
    validate_limits(config)?;
    validate_output(config)?;
    Ok(())
}

/// Validates a delay in seconds: finite, non-negative and at most one day
fn validate_delay(name: &str, secs: f64) -> Result<(), ConfigError> {
    if !secs.is_finite() || secs < 0.0 {
        return Err(ConfigError::Validation(format!(
            "{} must be a finite number >= 0, got {}",
            name, secs
        )));
    }

    if secs > MAX_DELAY_SECS {
        return Err(ConfigError::Validation(format!(
            "{} must be <= {} seconds, got {}",
            name, MAX_DELAY_SECS, secs
        )));
    }

    Ok(())
}

/// Validates the user agent header value
fn validate_user_agent(user_agent: &str) -> Result<(), ConfigError> {
    if user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if user_agent.chars().any(|c| c.is_control()) {
        return Err(ConfigError::Validation(format!(
            "user_agent must not contain control characters, got {:?}",
            user_agent
        )));
    }

    Ok(())
}

/// Validates numeric limits
fn validate_limits(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.timeout == 0 {
        return Err(ConfigError::Validation(
            "timeout must be > 0 seconds, got 0".to_string(),
        ));
    }

    if config.workers < 1 || config.workers > MAX_WORKERS {
        return Err(ConfigError::Validation(format!(
            "workers must be between 1 and {}, got {}",
            MAX_WORKERS, config.workers
        )));
    }

    if config.max_attempts < 1 || config.max_attempts > MAX_ATTEMPTS {
        return Err(ConfigError::Validation(format!(
            "max_attempts must be between 1 and {}, got {}",
            MAX_ATTEMPTS, config.max_attempts
        )));
    }

    if config.max_redirects > MAX_REDIRECTS {
        return Err(ConfigError::Validation(format!(
            "max_redirects must be <= {}, got {}",
            MAX_REDIRECTS, config.max_redirects
        )));
    }

    Ok(())
}

/// Validates output settings
fn validate_output(config: &CrawlConfig) -> Result<(), ConfigError> {
    if config.output_format == OutputFormat::Sqlite && config.output_path.is_none() {
        return Err(ConfigError::Validation(
            "output_format = \"sqlite\" requires output_path".to_string(),
        ));
    }

    if let Some(path) = &config.output_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "output_path cannot be empty".to_string(),
            ));
        }
    }

    if let Some(path) = &config.summary_path {
        if path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "summary_path cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
