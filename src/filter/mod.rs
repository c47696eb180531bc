//! URL filtering
//!
//! A [`UrlFilter`] is a composable predicate deciding whether a URL may be
//! fetched (the fetch filter) or mined for further links (the link-extraction
//! filter). Each crawl carries two independent instances.
//!
//! A URL passes when all of the following hold, checked in this order:
//!
//! 1. its scheme is in the allowed-scheme set (default `http`, `https`)
//! 2. its host matches an allowed host, or no allowed host is registered
//! 3. its path matches none of the reject patterns
//! 4. none of its query parameters matches a reject rule
//! 5. every registered filter function returns true

use crate::config::FilterConfig;
use crate::url::matches_wildcard;
use crate::ConfigError;
use regex::Regex;
use std::fmt;
use std::sync::Arc;
use url::Url;

/// A custom predicate registered with [`UrlFilter::add_filter_function`]
pub type FilterFn = Arc<dyn Fn(&Url) -> bool + Send + Sync>;

/// Rejects URLs carrying a given query parameter
///
/// Array-style parameters (`tag[]=a`, `tag[0]=a`) match a rule named `tag`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParamRule {
    /// Parameter name without any `[]` suffix
    pub name: String,

    /// Only reject when the parameter has this value; `None` rejects on presence
    pub value: Option<String>,
}

impl QueryParamRule {
    fn matches_key(&self, key: &str) -> bool {
        if key == self.name {
            return true;
        }
        key.strip_prefix(self.name.as_str())
            .map(|rest| rest.starts_with('[') && rest.ends_with(']'))
            .unwrap_or(false)
    }

    fn matches(&self, key: &str, value: &str) -> bool {
        self.matches_key(key) && self.value.as_deref().map_or(true, |v| v == value)
    }
}

/// Composable URL predicate
#[derive(Clone)]
pub struct UrlFilter {
    allowed_schemes: Vec<String>,
    allowed_hosts: Vec<String>,
    reject_paths: Vec<Regex>,
    reject_query_params: Vec<QueryParamRule>,
    filter_functions: Vec<FilterFn>,
}

impl Default for UrlFilter {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            allowed_hosts: Vec::new(),
            reject_paths: Vec::new(),
            reject_query_params: Vec::new(),
            filter_functions: Vec::new(),
        }
    }
}

impl fmt::Debug for UrlFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlFilter")
            .field("allowed_schemes", &self.allowed_schemes)
            .field("allowed_hosts", &self.allowed_hosts)
            .field(
                "reject_paths",
                &self.reject_paths.iter().map(Regex::as_str).collect::<Vec<_>>(),
            )
            .field("reject_query_params", &self.reject_query_params)
            .field("filter_functions", &self.filter_functions.len())
            .finish()
    }
}

impl UrlFilter {
    /// Creates a filter that accepts every HTTP(S) URL
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a filter from its configuration section
    ///
    /// Fails on the first reject pattern that is not a valid regex, so a bad
    /// pattern surfaces at configuration time instead of mid-crawl.
    pub fn from_config(config: &FilterConfig) -> Result<Self, ConfigError> {
        let mut filter = Self::new();
        filter.set_allowed_schemes(config.allowed_schemes.iter().map(String::as_str));
        for host in &config.allowed_hosts {
            filter.add_allowed_host(host);
        }
        for pattern in &config.reject_paths {
            filter.reject_path_by_regex(pattern)?;
        }
        for rule in &config.reject_query_params {
            filter.reject_by_query_param(&rule.name, rule.value.as_deref());
        }
        Ok(filter)
    }

    /// Replaces the allowed-scheme set
    pub fn set_allowed_schemes<'a>(&mut self, schemes: impl IntoIterator<Item = &'a str>) -> &mut Self {
        self.allowed_schemes = schemes.into_iter().map(|s| s.to_ascii_lowercase()).collect();
        self
    }

    /// Allows a host; exact (`example.com`) or wildcard (`*.example.com`)
    pub fn add_allowed_host(&mut self, host: &str) -> &mut Self {
        let host = host.to_ascii_lowercase();
        if !self.allowed_hosts.contains(&host) {
            self.allowed_hosts.push(host);
        }
        self
    }

    /// Rejects every URL whose path matches `pattern`
    pub fn reject_path_by_regex(&mut self, pattern: &str) -> Result<&mut Self, ConfigError> {
        let regex = Regex::new(pattern).map_err(|e| {
            ConfigError::InvalidPattern(format!("Invalid reject pattern '{}': {}", pattern, e))
        })?;
        self.reject_paths.push(regex);
        Ok(self)
    }

    /// Rejects URLs carrying the query parameter `name` (optionally with `value`)
    pub fn reject_by_query_param(&mut self, name: &str, value: Option<&str>) -> &mut Self {
        self.reject_query_params.push(QueryParamRule {
            name: name.to_string(),
            value: value.map(str::to_string),
        });
        self
    }

    /// Adds a custom predicate; the URL is rejected if it returns false
    pub fn add_filter_function<F>(&mut self, predicate: F) -> &mut Self
    where
        F: Fn(&Url) -> bool + Send + Sync + 'static,
    {
        self.filter_functions.push(Arc::new(predicate));
        self
    }

    /// Returns the registered allowed hosts
    pub fn allowed_hosts(&self) -> &[String] {
        &self.allowed_hosts
    }

    /// Returns true if the URL passes every check
    pub fn filter(&self, url: &Url) -> bool {
        self.filter_scheme(url)
            && self.filter_host(url)
            && self.filter_path(url)
            && self.filter_query(url)
            && self.filter_custom(url)
    }

    /// Parses `url` and filters it; unparseable input is rejected
    pub fn filter_str(&self, url: &str) -> bool {
        Url::parse(url).map(|u| self.filter(&u)).unwrap_or(false)
    }

    fn filter_scheme(&self, url: &Url) -> bool {
        self.allowed_schemes.iter().any(|s| s == url.scheme())
    }

    fn filter_host(&self, url: &Url) -> bool {
        if self.allowed_hosts.is_empty() {
            return true;
        }
        match url.host_str() {
            Some(host) => self
                .allowed_hosts
                .iter()
                .any(|pattern| matches_wildcard(pattern, host)),
            None => false,
        }
    }

    fn filter_path(&self, url: &Url) -> bool {
        !self.reject_paths.iter().any(|re| re.is_match(url.path()))
    }

    fn filter_query(&self, url: &Url) -> bool {
        if self.reject_query_params.is_empty() || url.query().is_none() {
            return true;
        }
        !url.query_pairs().any(|(key, value)| {
            self.reject_query_params
                .iter()
                .any(|rule| rule.matches(&key, &value))
        })
    }

    fn filter_custom(&self, url: &Url) -> bool {
        self.filter_functions.iter().all(|predicate| predicate(url))
    }
}
