use crate::config::types::{Config, FilterConfig, MirrorConfig, SpiderConfig};
use crate::url::normalize_url;
use crate::ConfigError;
use regex::Regex;

/// HTTP methods the scheduler may issue
const ALLOWED_METHODS: &[&str] = &["GET", "HEAD"];

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_spider_config(&config.spider)?;
    validate_filter_config("fetch-filter", &config.fetch_filter)?;
    validate_filter_config("link-filter", &config.link_filter)?;
    validate_mirror_config(&config.mirror)?;
    Ok(())
}

/// Validates scheduler configuration
fn validate_spider_config(config: &SpiderConfig) -> Result<(), ConfigError> {
    if config.concurrency < 1 || config.concurrency > 100 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 100, got {}",
            config.concurrency
        )));
    }

    let method = config.method.to_ascii_uppercase();
    if !ALLOWED_METHODS.contains(&method.as_str()) {
        return Err(ConfigError::Validation(format!(
            "method must be one of {:?}, got '{}'",
            ALLOWED_METHODS, config.method
        )));
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates one filter section
fn validate_filter_config(section: &str, config: &FilterConfig) -> Result<(), ConfigError> {
    if config.allowed_schemes.is_empty() {
        return Err(ConfigError::Validation(format!(
            "{}: allowed-schemes cannot be empty",
            section
        )));
    }

    for host in &config.allowed_hosts {
        validate_host_pattern(host)?;
    }

    for pattern in &config.reject_paths {
        Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("{}: '{}': {}", section, pattern, e))
        })?;
    }

    for rule in &config.reject_query_params {
        if rule.name.trim().is_empty() {
            return Err(ConfigError::Validation(format!(
                "{}: reject-query-params entries need a name",
                section
            )));
        }
    }

    Ok(())
}

/// Validates mirror configuration
fn validate_mirror_config(config: &MirrorConfig) -> Result<(), ConfigError> {
    for url in &config.additional_urls {
        normalize_url(url).map_err(|e| {
            ConfigError::InvalidUrl(format!("Invalid additional URL '{}': {}", url, e))
        })?;
    }
    Ok(())
}

/// Validates an allowed-host pattern (supports a leading "*." wildcard)
fn validate_host_pattern(pattern: &str) -> Result<(), ConfigError> {
    let host = pattern.strip_prefix("*.").unwrap_or(pattern);

    if host.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Host pattern cannot be empty".to_string(),
        ));
    }

    if !host
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' contains invalid characters",
            pattern
        )));
    }

    if host.starts_with('.') || host.ends_with('.') || host.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Host '{}' has misplaced dots",
            pattern
        )));
    }

    Ok(())
}
