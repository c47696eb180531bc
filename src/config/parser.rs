use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use sha2::{Digest, Sha256};
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses and validates configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let config: Config = toml::from_str(content)?;
    validate(&config)?;
    Ok(config)
}

/// Computes a SHA-256 hash of the configuration file content
///
/// Logged at startup so two crawl runs can be told apart by their settings.
pub fn compute_config_hash(path: &Path) -> Result<String, ConfigError> {
    let content = std::fs::read(path)?;
    let mut hasher = Sha256::new();
    hasher.update(&content);
    Ok(hex::encode(hasher.finalize()))
}

/// Loads a configuration and returns both the config and its hash
pub fn load_config_with_hash(path: &Path) -> Result<(Config, String), ConfigError> {
    let config = load_config(path)?;
    let hash = compute_config_hash(path)?;
    Ok((config, hash))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    #[test]
    fn test_load_valid_config() {
        let config_content = r#"
[spider]
concurrency = 8
method = "GET"
timeout-secs = 10
user-agent = "TestSpider/1.0"

[discovery]
discard-fragment = false

[fetch-filter]
allowed-hosts = ["example.com", "*.example.org"]
reject-paths = ["^/admin"]
reject-query-params = [{ name = "sessionid" }, { name = "lang", value = "de" }]

[link-filter]
allowed-schemes = ["https"]

[mirror]
track-trailing-slash-redirects = true
additional-urls = ["https://example.com/sitemap.xml"]
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.spider.concurrency, 8);
        assert_eq!(config.spider.timeout_secs, 10);
        assert_eq!(config.spider.user_agent, "TestSpider/1.0");
        assert!(!config.discovery.discard_fragment);
        assert_eq!(config.fetch_filter.allowed_hosts.len(), 2);
        assert_eq!(config.fetch_filter.reject_query_params.len(), 2);
        assert_eq!(
            config.fetch_filter.reject_query_params[1].value.as_deref(),
            Some("de")
        );
        assert_eq!(config.link_filter.allowed_schemes, vec!["https".to_string()]);
        assert!(config.mirror.track_trailing_slash_redirects);
        assert_eq!(config.mirror.additional_urls.len(), 1);
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.spider.concurrency, 4);
        assert_eq!(config.spider.method, "GET");
        assert!(config.discovery.discard_fragment);
        assert_eq!(config.fetch_filter.allowed_schemes.len(), 2);
        assert!(config.fetch_filter.allowed_hosts.is_empty());
        assert!(!config.mirror.track_trailing_slash_redirects);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/spinneret.toml"));
        assert!(matches!(result, Err(ConfigError::Io(_))));
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_load_config_with_validation_error() {
        let file = create_temp_config("[spider]\nconcurrency = 0\n");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_bad_reject_pattern_fails_at_load() {
        let file = create_temp_config("[fetch-filter]\nreject-paths = [\"(unclosed\"]\n");
        let result = load_config(file.path());
        assert!(matches!(result, Err(ConfigError::InvalidPattern(_))));
    }

    #[test]
    fn test_compute_config_hash() {
        let file = create_temp_config("test content");

        let hash1 = compute_config_hash(file.path()).unwrap();
        let hash2 = compute_config_hash(file.path()).unwrap();

        assert_eq!(hash1, hash2);
        assert_eq!(hash1.len(), 64);
    }

    #[test]
    fn test_different_content_different_hash() {
        let file1 = create_temp_config("content 1");
        let file2 = create_temp_config("content 2");

        let hash1 = compute_config_hash(file1.path()).unwrap();
        let hash2 = compute_config_hash(file2.path()).unwrap();

        assert_ne!(hash1, hash2);
    }
}
