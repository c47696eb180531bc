//! Configuration module for Spinneret
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//! Every section and key is optional.
//!
//! # Example
//!
//! ```no_run
//! use spinneret::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("spinneret.toml")).unwrap();
//! println!("Concurrent requests: {}", config.spider.concurrency);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, DiscoveryConfig, FilterConfig, MirrorConfig, QueryParamConfig, SpiderConfig,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
