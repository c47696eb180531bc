//! Crawler module for web page fetching and link discovery
//!
//! This module contains the crawl engine:
//! - HTTP transport with manual redirect handling
//! - Bounded-concurrency fetch scheduling and event dispatch
//! - HTML and CSS link extraction and rewriting
//! - URL discovery, resolution and referer tracking
//! - The crawl driver connecting all of it to an application

mod coordinator;
mod events;
mod parser;
pub(crate) mod scheduler;
mod spider;
mod transport;

pub use coordinator::{Application, Crawler};
pub use events::{
    media_type, ExceptionEvent, FetchEvent, FetchListener, ListenerSet, RedirectEvent,
    ResponseEvent, REDIRECT_STATUSES,
};
pub use parser::{
    extract_css_urls, extract_html_links, rewrite_css, rewrite_html, ExtractedLink, LinkAttribute,
};
pub use scheduler::{FetchScheduler, QueueHandle, RunState, RunStats, SchedulerConfig};
pub use spider::{
    Discovery, DiscoveryOutcome, FoundUrl, LinkOptions, Referer, RefererIndex, RejectedUrl,
    Spider, UrlNormalizer, UrlRewriter,
};
pub use transport::{
    build_http_client, FetchRequest, HttpResponse, ReqwestTransport, Transport, TransportError,
};
