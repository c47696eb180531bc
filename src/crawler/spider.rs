//! Link discovery
//!
//! The [`Spider`] turns raw references found in fetched documents into queued
//! URLs. Every candidate goes through the same pipeline:
//!
//! 1. trim, skip empty values, self-references and non-crawlable schemes
//! 2. resolve against the referring page, canonicalize, drop the fragment
//! 3. run the registered URL normalizers in order
//! 4. drop same-document references to the referring page
//! 5. record the referer, then ask the fetch filter
//! 6. enqueue accepted URLs; report rejected ones
//!
//! Redirect targets take the same path without a referring page, inheriting
//! the referers of the redirected URL instead.

use crate::config::Config;
use crate::crawler::events::{ExceptionEvent, RedirectEvent};
use crate::crawler::parser::{
    extract_css_urls, extract_html_links, rewrite_css, rewrite_html, ExtractedLink, LinkAttribute,
};
use crate::crawler::scheduler::QueueHandle;
use crate::filter::UrlFilter;
use crate::url::{
    canonicalize, is_equivalent, is_non_crawlable, is_same_document_reference, resolve_reference,
};
use crate::ConfigError;
use std::collections::HashMap;
use url::Url;

/// Callback applied to every resolved URL before filtering
pub type UrlNormalizer = Box<dyn Fn(Url) -> Url + Send + Sync>;

/// Callback rewriting a URL inside a mirrored document
///
/// Receives whether the URL was accepted and the URL as resolved so far.
pub type UrlRewriter = Box<dyn Fn(bool, &str) -> String + Send + Sync>;

/// What to scan in a fetched document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkOptions {
    /// Scan `href` attributes of HTML documents
    pub extract_href: bool,

    /// Scan `src` attributes of HTML documents
    pub extract_src: bool,

    /// Scan `url(...)` references of `text/css` documents
    pub look_in_css: bool,

    /// Rewrite scanned references and return the rewritten body
    pub rewrite_urls: bool,
}

impl Default for LinkOptions {
    fn default() -> Self {
        Self {
            extract_href: true,
            extract_src: false,
            look_in_css: false,
            rewrite_urls: false,
        }
    }
}

/// One page linking to a URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Referer {
    /// The referring page
    pub page: Url,

    /// The reference as written on that page, before resolution
    pub raw: String,

    /// Texts of the links on that page, in document order
    pub link_texts: Vec<String>,
}

/// Maps every discovered URL to the pages that link to it
///
/// Grows for the whole run; entries are never removed.
#[derive(Debug, Default)]
pub struct RefererIndex {
    entries: HashMap<String, Vec<Referer>>,
}

impl RefererIndex {
    /// Records that `page` links to `url` via `raw`
    pub fn record(&mut self, url: &Url, page: &Url, raw: &str, link_text: Option<&str>) {
        let referers = self.entries.entry(url.as_str().to_string()).or_default();
        let entry = match referers.iter().position(|r| r.page == *page) {
            Some(i) => &mut referers[i],
            None => {
                referers.push(Referer {
                    page: page.clone(),
                    raw: raw.to_string(),
                    link_texts: Vec::new(),
                });
                let last = referers.len() - 1;
                &mut referers[last]
            }
        };
        entry.raw = raw.to_string();
        if let Some(text) = link_text {
            entry.link_texts.push(text.to_string());
        }
    }

    /// Copies the referers of `from` onto `to`, merging with existing ones
    pub fn inherit(&mut self, from: &Url, to: &Url) {
        let Some(inherited) = self.entries.get(from.as_str()).cloned() else {
            return;
        };
        let referers = self.entries.entry(to.as_str().to_string()).or_default();
        for referer in inherited {
            match referers.iter_mut().find(|r| r.page == referer.page) {
                Some(existing) => existing.link_texts.extend(referer.link_texts),
                None => referers.push(referer),
            }
        }
    }

    /// Returns the referers of `url`, in discovery order
    pub fn get(&self, url: &str) -> &[Referer] {
        self.entries.get(url).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of URLs with at least one referer
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Fate of one discovered reference
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryOutcome {
    /// Empty, a self-reference or a non-crawlable scheme
    Skipped,

    /// Points into the referring page itself
    SameDocument,

    /// Passed the fetch filter and was queued
    Queued,

    /// Passed the fetch filter but the queue already knew it
    AlreadyKnown,

    /// Refused by the fetch filter
    Rejected,

    /// Could not be resolved or queued
    EnqueueFailed,
}

/// A processed reference
#[derive(Debug, Clone)]
pub struct FoundUrl {
    /// The reference exactly as found
    pub raw: String,

    /// The resolved URL, unless resolution was skipped or failed
    pub resolved: Option<Url>,

    pub outcome: DiscoveryOutcome,
}

impl FoundUrl {
    /// True for URLs the crawl follows; same-document references count too
    pub fn accepted(&self) -> bool {
        matches!(
            self.outcome,
            DiscoveryOutcome::SameDocument | DiscoveryOutcome::Queued | DiscoveryOutcome::AlreadyKnown
        )
    }
}

/// A URL refused by the fetch filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectedUrl {
    pub url: Url,
    pub referer: Option<Url>,
}

/// Result of scanning one document
#[derive(Debug, Default)]
pub struct Discovery {
    pub links: Vec<FoundUrl>,

    /// The rewritten body, when rewriting was requested and succeeded
    pub body: Option<Vec<u8>>,
}

/// Discovery engine shared by all consumers of a crawl
pub struct Spider {
    fetch_filter: UrlFilter,
    link_filter: UrlFilter,
    discard_fragment: bool,
    referers: RefererIndex,
    normalizers: Vec<UrlNormalizer>,
    rewriters: Vec<UrlRewriter>,
    rejected: Vec<RejectedUrl>,
}

impl Default for Spider {
    fn default() -> Self {
        Self {
            fetch_filter: UrlFilter::new(),
            link_filter: UrlFilter::new(),
            discard_fragment: true,
            referers: RefererIndex::default(),
            normalizers: Vec::new(),
            rewriters: Vec::new(),
            rejected: Vec::new(),
        }
    }
}

impl Spider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a spider with both filters and the discovery settings from `config`
    pub fn from_config(config: &Config) -> Result<Self, ConfigError> {
        Ok(Self {
            fetch_filter: UrlFilter::from_config(&config.fetch_filter)?,
            link_filter: UrlFilter::from_config(&config.link_filter)?,
            discard_fragment: config.discovery.discard_fragment,
            ..Self::default()
        })
    }

    /// The filter deciding which URLs are fetched
    pub fn fetch_filter(&self) -> &UrlFilter {
        &self.fetch_filter
    }

    pub fn fetch_filter_mut(&mut self) -> &mut UrlFilter {
        &mut self.fetch_filter
    }

    /// The filter deciding which fetched documents are scanned for links
    pub fn link_filter(&self) -> &UrlFilter {
        &self.link_filter
    }

    pub fn link_filter_mut(&mut self) -> &mut UrlFilter {
        &mut self.link_filter
    }

    pub fn set_discard_fragment(&mut self, discard: bool) {
        self.discard_fragment = discard;
    }

    /// Registers a normalizer; normalizers run in registration order
    pub fn add_url_normalizer<F>(&mut self, normalizer: F)
    where
        F: Fn(Url) -> Url + Send + Sync + 'static,
    {
        self.normalizers.push(Box::new(normalizer));
    }

    /// Registers a rewriter; rewriters run in registration order
    pub fn add_url_rewriter<F>(&mut self, rewriter: F)
    where
        F: Fn(bool, &str) -> String + Send + Sync + 'static,
    {
        self.rewriters.push(Box::new(rewriter));
    }

    pub fn referers(&self) -> &RefererIndex {
        &self.referers
    }

    /// Returns the pages linking to `url`
    pub fn referring_pages(&self, url: &str) -> Vec<&Url> {
        self.referers.get(url).iter().map(|r| &r.page).collect()
    }

    /// Returns the texts of all links to `url`, across referring pages
    pub fn link_texts(&self, url: &str) -> Vec<&str> {
        self.referers
            .get(url)
            .iter()
            .flat_map(|r| r.link_texts.iter().map(String::as_str))
            .collect()
    }

    /// Removes and returns the URLs rejected since the last call
    pub fn take_rejected(&mut self) -> Vec<RejectedUrl> {
        std::mem::take(&mut self.rejected)
    }

    /// Runs one raw reference through the discovery pipeline
    ///
    /// `referer` is the page the reference was found on; `None` for redirect
    /// targets and seed URLs.
    pub fn handle_found_url(
        &mut self,
        queue: &mut QueueHandle<'_>,
        raw: &str,
        referer: Option<&Url>,
        link_text: Option<&str>,
    ) -> FoundUrl {
        let trimmed = raw.trim();
        let skipped = |outcome| FoundUrl {
            raw: raw.to_string(),
            resolved: None,
            outcome,
        };

        if trimmed.is_empty() || referer.is_some_and(|r| r.as_str() == trimmed) {
            return skipped(DiscoveryOutcome::Skipped);
        }
        if is_non_crawlable(trimmed) {
            return skipped(DiscoveryOutcome::Skipped);
        }

        let resolved = match referer {
            Some(base) => resolve_reference(trimmed, base, self.discard_fragment),
            None => self.resolve_absolute(trimmed),
        };
        let mut url = match resolved {
            Ok(url) => url,
            Err(e) => {
                tracing::warn!("Could not resolve {}: {}", trimmed, e);
                return skipped(DiscoveryOutcome::EnqueueFailed);
            }
        };

        for normalizer in &self.normalizers {
            url = normalizer(url);
        }

        let found = |outcome, url: Url| FoundUrl {
            raw: raw.to_string(),
            resolved: Some(url),
            outcome,
        };

        if let Some(base) = referer {
            if is_same_document_reference(&url, base) || is_equivalent(&url, base) {
                return found(DiscoveryOutcome::SameDocument, url);
            }
            self.referers.record(&url, base, raw, link_text);
        }

        if !self.fetch_filter.filter(&url) {
            tracing::debug!("URL {} rejected by fetch filter", url);
            self.rejected.push(RejectedUrl {
                url: url.clone(),
                referer: referer.cloned(),
            });
            return found(DiscoveryOutcome::Rejected, url);
        }

        match queue.add(&url, false) {
            Ok(true) => found(DiscoveryOutcome::Queued, url),
            Ok(false) => found(DiscoveryOutcome::AlreadyKnown, url),
            Err(e) => {
                tracing::warn!("Could not queue {}: {}", url, e);
                found(DiscoveryOutcome::EnqueueFailed, url)
            }
        }
    }

    fn resolve_absolute(&self, raw: &str) -> Result<Url, crate::UrlError> {
        let mut url = Url::parse(raw).map_err(|e| crate::UrlError::Parse(format!("{}: {}", raw, e)))?;
        canonicalize(&mut url);
        if self.discard_fragment {
            url.set_fragment(None);
        }
        Ok(url)
    }

    /// Scans a fetched document and feeds every reference into discovery
    ///
    /// Nothing is scanned unless the link filter accepts `request_url`.
    /// `content_type` is the bare media type (`text/html`, `text/css`).
    pub fn discover_links(
        &mut self,
        queue: &mut QueueHandle<'_>,
        request_url: &Url,
        content_type: Option<&str>,
        body: &[u8],
        options: &LinkOptions,
    ) -> Discovery {
        if !self.link_filter.filter(request_url) {
            tracing::debug!("Not scanning {} for links", request_url);
            return Discovery::default();
        }

        match content_type {
            Some("text/html") => self.discover_in_html(queue, request_url, body, options),
            Some("text/css") if options.look_in_css => {
                self.discover_in_css(queue, request_url, body, options)
            }
            _ => Discovery::default(),
        }
    }

    fn discover_in_html(
        &mut self,
        queue: &mut QueueHandle<'_>,
        request_url: &Url,
        body: &[u8],
        options: &LinkOptions,
    ) -> Discovery {
        let html = String::from_utf8_lossy(body);
        let mut candidates: Vec<ExtractedLink> = Vec::new();
        if options.extract_href {
            candidates.extend(extract_html_links(&html, LinkAttribute::Href));
        }
        if options.extract_src {
            candidates.extend(extract_html_links(&html, LinkAttribute::Src));
        }

        let links: Vec<FoundUrl> = candidates
            .iter()
            .map(|link| {
                self.handle_found_url(queue, &link.raw, Some(request_url), link.text.as_deref())
            })
            .collect();

        let body = if options.rewrite_urls {
            let replacements = self.replacements(&links);
            match rewrite_html(body, options.extract_href, options.extract_src, |value| {
                replacements.get(value).cloned()
            }) {
                Ok(rewritten) => Some(rewritten),
                Err(e) => {
                    tracing::warn!("Could not rewrite links in {}: {}", request_url, e);
                    None
                }
            }
        } else {
            None
        };

        Discovery { links, body }
    }

    fn discover_in_css(
        &mut self,
        queue: &mut QueueHandle<'_>,
        request_url: &Url,
        body: &[u8],
        options: &LinkOptions,
    ) -> Discovery {
        let css = String::from_utf8_lossy(body);
        let links: Vec<FoundUrl> = extract_css_urls(&css)
            .iter()
            .map(|raw| self.handle_found_url(queue, raw, Some(request_url), None))
            .collect();

        let body = options.rewrite_urls.then(|| {
            let replacements = self.replacements(&links);
            rewrite_css(&css, |value| replacements.get(value).cloned()).into_bytes()
        });

        Discovery { links, body }
    }

    /// Maps each raw reference to its rewritten form, omitting unchanged ones
    fn replacements(&self, links: &[FoundUrl]) -> HashMap<String, String> {
        if self.rewriters.is_empty() {
            return HashMap::new();
        }

        links
            .iter()
            .filter_map(|link| {
                let current = link
                    .resolved
                    .as_ref()
                    .map(|u| u.to_string())
                    .unwrap_or_else(|| link.raw.clone());
                let rewritten = self.rewrite_url(link.accepted(), current);
                (rewritten != link.raw).then(|| (link.raw.clone(), rewritten))
            })
            .collect()
    }

    /// Applies every rewriter in registration order
    pub fn rewrite_url(&self, accepted: bool, url: String) -> String {
        self.rewriters
            .iter()
            .fold(url, |current, rewriter| rewriter(accepted, &current))
    }

    /// Follows a redirect: resolves its target and runs it through discovery
    ///
    /// The target inherits the referers of the redirected URL. Returns the
    /// resolved target, or `None` if the response carried no usable location.
    pub fn handle_redirect(
        &mut self,
        queue: &mut QueueHandle<'_>,
        event: &RedirectEvent,
    ) -> Option<Url> {
        let Some(location) = event.location.as_deref() else {
            tracing::warn!(
                "Redirect {} on URL {} without Location header",
                event.status_code,
                event.request_url
            );
            return None;
        };

        let target = match resolve_reference(location, &event.request_url, self.discard_fragment) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Invalid redirect target on URL {}: {}", event.request_url, e);
                return None;
            }
        };

        tracing::info!(
            "Redirect {} from {} to {}",
            event.status_code,
            event.request_url,
            target
        );

        let found = self.handle_found_url(queue, target.as_str(), None, None);
        let target = found.resolved.unwrap_or(target);
        self.referers.inherit(&event.request_url, &target);
        Some(target)
    }

    /// Logs a failed request together with the pages linking to it
    pub fn log_exception(&self, event: &ExceptionEvent) {
        match event.status() {
            Some(status) if (400..500).contains(&status) => {
                let pages: Vec<String> = self
                    .referring_pages(event.request_url.as_str())
                    .iter()
                    .map(|u| u.to_string())
                    .collect();
                tracing::warn!(
                    "Error {} on URL {}. Referring pages: {}",
                    status,
                    event.request_url,
                    pages.join(", ")
                );
            }
            _ => {
                tracing::warn!("Error on URL {}: {}", event.request_url, event.error);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crawler::transport::HttpResponse;
    use crate::queue::{Queue, UrlQueue};
    use reqwest::header::{HeaderMap, HeaderValue};

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn redirect(from: &str, location: &str) -> RedirectEvent {
        let mut headers = HeaderMap::new();
        headers.insert("location", HeaderValue::from_str(location).unwrap());
        RedirectEvent {
            request_url: url(from),
            status_code: 301,
            location: Some(location.to_string()),
            response: HttpResponse {
                url: url(from),
                status: 301,
                headers,
                body: Vec::new(),
            },
        }
    }

    #[test]
    fn test_relative_links_resolved_and_queued() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/c/d");

        let found = spider.handle_found_url(&mut QueueHandle::new(&mut queue), "/a/b", Some(&page), None);
        assert_eq!(found.outcome, DiscoveryOutcome::Queued);
        assert_eq!(found.resolved.unwrap().as_str(), "https://example.com/a/b");
        assert!(queue.is_queued("https://example.com/a/b"));

        let dir = url("https://example.com/c/d/");
        let found = spider.handle_found_url(&mut QueueHandle::new(&mut queue), "../x", Some(&dir), None);
        assert_eq!(found.resolved.unwrap().as_str(), "https://example.com/c/x");
    }

    #[test]
    fn test_same_page_fragment_not_discovered() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/p");

        let found =
            spider.handle_found_url(&mut QueueHandle::new(&mut queue), "#section", Some(&page), None);
        assert_eq!(found.outcome, DiscoveryOutcome::SameDocument);
        assert!(found.accepted());
        assert!(queue.is_empty());
        assert!(spider.referers().is_empty());

        // Also with fragments kept
        spider.set_discard_fragment(false);
        let found =
            spider.handle_found_url(&mut QueueHandle::new(&mut queue), "#other", Some(&page), None);
        assert_eq!(found.outcome, DiscoveryOutcome::SameDocument);
        assert!(queue.is_empty());
    }

    #[test]
    fn test_skipped_references() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/p");
        let mut handle = QueueHandle::new(&mut queue);

        for raw in ["", "   ", "https://example.com/p", "mailto:a@example.com", "tel:123", "data:text/plain,x", "javascript:void(0)"] {
            let found = spider.handle_found_url(&mut handle, raw, Some(&page), None);
            assert_eq!(found.outcome, DiscoveryOutcome::Skipped, "{}", raw);
        }
        assert!(handle.is_empty());
    }

    #[test]
    fn test_rejected_urls_reported() {
        let mut spider = Spider::new();
        spider.fetch_filter_mut().add_allowed_host("example.com");
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/");

        let found = spider.handle_found_url(
            &mut QueueHandle::new(&mut queue),
            "https://other.org/x",
            Some(&page),
            Some("Elsewhere"),
        );
        assert_eq!(found.outcome, DiscoveryOutcome::Rejected);

        let rejected = spider.take_rejected();
        assert_eq!(rejected.len(), 1);
        assert_eq!(rejected[0].url.as_str(), "https://other.org/x");
        assert_eq!(rejected[0].referer.as_ref(), Some(&page));
        assert!(spider.take_rejected().is_empty());

        // Recorded even though rejected
        assert_eq!(spider.link_texts("https://other.org/x"), vec!["Elsewhere"]);
    }

    #[test]
    fn test_normalizers_run_in_order() {
        let mut spider = Spider::new();
        spider.add_url_normalizer(|mut u| {
            u.set_query(None);
            u
        });
        spider.add_url_normalizer(|mut u| {
            let path = u.path().to_lowercase();
            u.set_path(&path);
            u
        });
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/");

        let found =
            spider.handle_found_url(&mut QueueHandle::new(&mut queue), "/A/B?x=1", Some(&page), None);
        assert_eq!(found.resolved.unwrap().as_str(), "https://example.com/a/b");
    }

    #[test]
    fn test_referers_and_link_texts() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let mut handle = QueueHandle::new(&mut queue);
        let p1 = url("https://example.com/one");
        let p2 = url("https://example.com/two");

        spider.handle_found_url(&mut handle, "/target", Some(&p1), Some("First"));
        spider.handle_found_url(&mut handle, "/target", Some(&p1), Some("Again"));
        spider.handle_found_url(&mut handle, "target", Some(&p2), None);

        let target = "https://example.com/target";
        let pages: Vec<_> = spider.referring_pages(target).iter().map(|u| u.as_str()).collect();
        assert_eq!(pages, vec!["https://example.com/one", "https://example.com/two"]);
        assert_eq!(spider.link_texts(target), vec!["First", "Again"]);
        assert_eq!(spider.referers().get(target)[1].raw, "target");
    }

    #[test]
    fn test_redirect_inherits_referers() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let home = url("https://example.com/");

        spider.handle_found_url(&mut QueueHandle::new(&mut queue), "/old", Some(&home), Some("Old"));
        let target = spider
            .handle_redirect(&mut QueueHandle::new(&mut queue), &redirect("https://example.com/old", "/new"))
            .unwrap();

        assert_eq!(target.as_str(), "https://example.com/new");
        assert!(queue.is_queued("https://example.com/new"));
        let pages: Vec<_> = spider
            .referring_pages("https://example.com/new")
            .iter()
            .map(|u| u.as_str())
            .collect();
        assert_eq!(pages, vec!["https://example.com/"]);
        assert_eq!(spider.link_texts("https://example.com/new"), vec!["Old"]);
    }

    #[test]
    fn test_redirect_merges_existing_referers() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let a = url("https://example.com/a");
        let b = url("https://example.com/b");

        spider.handle_found_url(&mut QueueHandle::new(&mut queue), "/old", Some(&a), None);
        spider.handle_found_url(&mut QueueHandle::new(&mut queue), "/new", Some(&b), None);
        spider.handle_redirect(&mut QueueHandle::new(&mut queue), &redirect("https://example.com/old", "/new"));

        assert_eq!(spider.referring_pages("https://example.com/new").len(), 2);
    }

    #[test]
    fn test_redirect_target_is_normalized() {
        let mut spider = Spider::new();
        spider.add_url_normalizer(|mut u| {
            let path = u.path().to_lowercase();
            u.set_path(&path);
            u
        });
        let mut queue = UrlQueue::new();
        let home = url("https://example.com/");

        spider.handle_found_url(&mut QueueHandle::new(&mut queue), "/old", Some(&home), Some("Old"));
        let target = spider
            .handle_redirect(&mut QueueHandle::new(&mut queue), &redirect("https://example.com/old", "/NEW"))
            .unwrap();

        assert_eq!(target.as_str(), "https://example.com/new");
        assert!(queue.is_queued("https://example.com/new"));
        assert!(!queue.is_queued("https://example.com/NEW"));
        assert_eq!(spider.referring_pages("https://example.com/new").len(), 1);
        assert!(spider.referring_pages("https://example.com/NEW").is_empty());
    }

    #[test]
    fn test_redirect_without_location() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let mut event = redirect("https://example.com/old", "/new");
        event.location = None;
        assert!(spider.handle_redirect(&mut QueueHandle::new(&mut queue), &event).is_none());
    }

    #[test]
    fn test_discover_html_href_and_src() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/dir/page.html");
        let body = br#"<a href="next.html">Next</a><img src="/img.png">"#;

        let options = LinkOptions::default();
        let found = spider.discover_links(&mut QueueHandle::new(&mut queue), &page, Some("text/html"), body, &options);
        assert_eq!(found.links.len(), 1);
        assert!(found.body.is_none());
        assert!(queue.is_queued("https://example.com/dir/next.html"));

        let options = LinkOptions {
            extract_src: true,
            ..LinkOptions::default()
        };
        spider.discover_links(&mut QueueHandle::new(&mut queue), &page, Some("text/html"), body, &options);
        assert!(queue.is_queued("https://example.com/img.png"));
    }

    #[test]
    fn test_discover_css_only_when_requested() {
        let mut spider = Spider::new();
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/css/site.css");
        let body = br#"body { background: url(../bg.png) } i { background: url(data:x) }"#;

        let found = spider.discover_links(&mut QueueHandle::new(&mut queue), &page, Some("text/css"), body, &LinkOptions::default());
        assert!(found.links.is_empty());

        let options = LinkOptions {
            look_in_css: true,
            ..LinkOptions::default()
        };
        let found = spider.discover_links(&mut QueueHandle::new(&mut queue), &page, Some("text/css"), body, &options);
        assert_eq!(found.links.len(), 1);
        assert!(queue.is_queued("https://example.com/bg.png"));
    }

    #[test]
    fn test_link_filter_gates_scanning() {
        let mut spider = Spider::new();
        spider.link_filter_mut().add_allowed_host("example.com");
        let mut queue = UrlQueue::new();
        let foreign = url("https://other.org/");

        let found = spider.discover_links(
            &mut QueueHandle::new(&mut queue),
            &foreign,
            Some("text/html"),
            br#"<a href="/x">x</a>"#,
            &LinkOptions::default(),
        );
        assert!(found.links.is_empty());
        assert!(queue.is_empty());
    }

    #[test]
    fn test_rewrite_urls() {
        let mut spider = Spider::new();
        spider.fetch_filter_mut().add_allowed_host("example.com");
        spider.add_url_rewriter(|accepted, u| {
            if accepted {
                u.replace("https://example.com", "")
            } else {
                u.to_string()
            }
        });
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/");
        let body = br#"<a href="https://example.com/a">A</a><a href="https://other.org/b">B</a>"#;

        let options = LinkOptions {
            rewrite_urls: true,
            ..LinkOptions::default()
        };
        let found = spider.discover_links(&mut QueueHandle::new(&mut queue), &page, Some("text/html"), body, &options);
        let out = String::from_utf8(found.body.unwrap()).unwrap();
        assert!(out.contains(r#"href="/a""#));
        assert!(out.contains(r#"href="https://other.org/b""#));
    }

    #[test]
    fn test_rewrite_urls_with_char_refs() {
        let mut spider = Spider::new();
        spider.fetch_filter_mut().add_allowed_host("example.com");
        spider.add_url_rewriter(|accepted, u| {
            if accepted {
                u.replace("https://example.com", "")
            } else {
                u.to_string()
            }
        });
        let mut queue = UrlQueue::new();
        let page = url("https://example.com/");
        let body = br#"<a href="https://example.com/a?x=1&amp;y=2">A</a>"#;

        let options = LinkOptions {
            rewrite_urls: true,
            ..LinkOptions::default()
        };
        let found = spider.discover_links(&mut QueueHandle::new(&mut queue), &page, Some("text/html"), body, &options);
        assert!(queue.is_queued("https://example.com/a?x=1&y=2"));
        let out = String::from_utf8(found.body.unwrap()).unwrap();
        assert!(out.contains("/a?x=1"));
        assert!(!out.contains("https://example.com/a"));
    }
}
