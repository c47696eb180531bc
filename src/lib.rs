//! Spinneret: a web spider with pluggable consumers
//!
//! This crate fetches pages over HTTP, discovers further URLs inside HTML and CSS,
//! filters which of them to follow, and hands every fetched document to a consumer:
//! a link checker, an indexer, or a site mirror that writes deduplicated content to disk.

pub mod apps;
pub mod config;
pub mod crawler;
pub mod filter;
pub mod mirror;
pub mod queue;
pub mod state;
pub mod url;

use thiserror::Error;

/// Main error type for Spinneret operations
#[derive(Debug, Error)]
pub enum SpiderError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Transport error: {0}")]
    Transport(#[from] crawler::TransportError),

    #[error("Mirror error: {0}")]
    Mirror(#[from] mirror::MirrorError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Only absolute HTTP(S) URLs are accepted: {0}")]
    NotAbsolute(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,
}

/// Result type alias for Spinneret operations
pub type Result<T> = std::result::Result<T, SpiderError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{Application, Crawler, FetchEvent, FetchScheduler, Spider};
pub use filter::UrlFilter;
pub use queue::{Queue, UrlQueue};
pub use state::EntryState;
pub use url::{normalize_url, resolve_reference};
