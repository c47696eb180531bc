//! URL handling module for Spinneret
//!
//! This module provides URL normalization, reference resolution against a
//! referring page, same-document detection, and host wildcard matching.
//!
//! Every URL that enters the queue or is used as a dedup key passes through
//! [`normalize_url`] (or [`resolve_reference`] for discovered links) first.

mod matcher;
mod normalize;
mod resolve;

pub use matcher::matches_wildcard;
pub use normalize::{canonicalize, normalize, normalize_percent_encoding, normalize_url};
pub use resolve::{is_equivalent, is_same_document_reference, resolve_reference};

use url::Url;

/// Schemes that are never crawlable, whatever the filters say
pub const NON_CRAWLABLE_SCHEMES: &[&str] = &["mailto:", "tel:", "data:", "javascript:"];

/// Extracts the lowercase host of a URL
///
/// # Examples
///
/// ```
/// use url::Url;
/// use spinneret::url::extract_domain;
///
/// let url = Url::parse("https://EXAMPLE.COM:8080/path").unwrap();
/// assert_eq!(extract_domain(&url), Some("example.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Returns true if a raw link string uses a scheme that is never fetched
pub fn is_non_crawlable(raw: &str) -> bool {
    let lower = raw.trim_start().to_ascii_lowercase();
    NON_CRAWLABLE_SCHEMES
        .iter()
        .any(|scheme| lower.starts_with(scheme))
}
