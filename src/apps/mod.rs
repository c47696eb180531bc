//! Crawl consumers
//!
//! Each type here implements [`Application`](crate::crawler::Application) and
//! is run by a [`Crawler`](crate::crawler::Crawler):
//! - [`LinkChecker`] reports broken links per referring page
//! - [`Indexer`] hands every fetched document to an [`IndexSink`]
//! - [`Webmirror`] saves the site into a [`MirrorStore`](crate::mirror::MirrorStore)

mod indexer;
mod linkchecker;
mod webmirror;

pub use indexer::{IndexSink, Indexer};
pub use linkchecker::{BrokenLink, LinkChecker};
pub use webmirror::{BodySaveListener, Webmirror};

use crate::filter::UrlFilter;
use url::Url;

/// Restricts `filter` to the host of `start`, keeping hosts already allowed
fn restrict_to_host(filter: &mut UrlFilter, start: &Url) {
    match start.host_str() {
        Some(host) => {
            filter.add_allowed_host(host);
        }
        None => tracing::warn!("Start URL {} has no host", start),
    }
}
