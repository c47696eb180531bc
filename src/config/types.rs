use serde::Deserialize;

/// Main configuration structure for Spinneret
///
/// Every section is optional; a missing section takes its defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub spider: SpiderConfig,

    pub discovery: DiscoveryConfig,

    /// URLs rejected by this filter are never fetched
    #[serde(rename = "fetch-filter")]
    pub fetch_filter: FilterConfig,

    /// Documents rejected by this filter are fetched but not mined for links
    #[serde(rename = "link-filter")]
    pub link_filter: FilterConfig,

    pub mirror: MirrorConfig,
}

/// Fetch scheduler configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SpiderConfig {
    /// Maximum number of requests in flight at once
    pub concurrency: u32,

    /// HTTP method used for every request (GET or HEAD)
    pub method: String,

    /// Per-request timeout in seconds (0 disables the timeout)
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for SpiderConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            method: "GET".to_string(),
            timeout_secs: 30,
            user_agent: format!("spinneret/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Link discovery configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Strip the fragment from discovered URLs
    #[serde(rename = "discard-fragment")]
    pub discard_fragment: bool,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            discard_fragment: true,
        }
    }
}

/// Configuration of one URL filter
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FilterConfig {
    /// Allowed schemes
    #[serde(rename = "allowed-schemes")]
    pub allowed_schemes: Vec<String>,

    /// Allowed hosts (e.g., "example.com" or "*.example.com"); empty allows any host
    #[serde(rename = "allowed-hosts")]
    pub allowed_hosts: Vec<String>,

    /// Regular expressions matched against the URL path
    #[serde(rename = "reject-paths")]
    pub reject_paths: Vec<String>,

    /// Query parameters that cause rejection
    #[serde(rename = "reject-query-params")]
    pub reject_query_params: Vec<QueryParamConfig>,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            allowed_schemes: vec!["http".to_string(), "https".to_string()],
            allowed_hosts: Vec::new(),
            reject_paths: Vec::new(),
            reject_query_params: Vec::new(),
        }
    }
}

/// A query parameter reject rule
#[derive(Debug, Clone, Deserialize)]
pub struct QueryParamConfig {
    /// Parameter name; array-style variants (`name[]`) match too
    pub name: String,

    /// Reject only this value; omit to reject on presence
    #[serde(default)]
    pub value: Option<String>,
}

/// Site mirror configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MirrorConfig {
    /// Record "/dir" -> "/dir/" redirects as symlink aliases too
    #[serde(rename = "track-trailing-slash-redirects")]
    pub track_trailing_slash_redirects: bool,

    /// Extra URLs queued next to the start URL
    #[serde(rename = "additional-urls")]
    pub additional_urls: Vec<String>,

    /// Run registered URL rewriters over saved HTML and CSS
    #[serde(rename = "rewrite-links")]
    pub rewrite_links: bool,
}
