use crate::apps::restrict_to_host;
use crate::config::MirrorConfig;
use crate::crawler::{Application, LinkOptions, QueueHandle, RedirectEvent, ResponseEvent, Spider};
use crate::mirror::{MirrorError, MirrorStats, MirrorStore};
use crate::Result;
use chrono::Local;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Hook transforming a document body right before it is saved
///
/// Receives the bare media type and the body; returns the body to save.
pub type BodySaveListener = Box<dyn Fn(Option<&str>, Vec<u8>) -> Vec<u8> + Send + Sync>;

/// Mirrors one site into a directory
///
/// Follows `href` and `src` attributes and stylesheet references on the start
/// host, saves every fetched document and removes files of earlier runs that
/// this run did not reach.
pub struct Webmirror {
    store: MirrorStore,
    additional_urls: Vec<String>,
    rewrite_links: bool,
    body_save_listeners: Vec<BodySaveListener>,
    cancel: Option<CancellationToken>,
}

impl Webmirror {
    pub fn new(store: MirrorStore) -> Self {
        Self {
            store,
            additional_urls: Vec::new(),
            rewrite_links: false,
            body_save_listeners: Vec::new(),
            cancel: None,
        }
    }

    /// Opens the mirror directory at `root` with the `[mirror]` settings
    pub fn from_config(root: impl AsRef<Path>, config: &MirrorConfig) -> std::result::Result<Self, MirrorError> {
        let mut store = MirrorStore::open(root)?;
        store.set_track_trailing_slash_redirects(config.track_trailing_slash_redirects);

        let mut mirror = Self::new(store);
        mirror.additional_urls = config.additional_urls.clone();
        mirror.rewrite_links = config.rewrite_links;
        Ok(mirror)
    }

    /// Queues `url` next to the start URL
    pub fn add_additional_url(&mut self, url: impl Into<String>) {
        self.additional_urls.push(url.into());
    }

    /// Runs the spider's URL rewriters over saved HTML and CSS
    pub fn set_rewrite_links(&mut self, rewrite: bool) {
        self.rewrite_links = rewrite;
    }

    /// Registers a body hook; hooks run in registration order
    pub fn add_body_save_listener<F>(&mut self, listener: F)
    where
        F: Fn(Option<&str>, Vec<u8>) -> Vec<u8> + Send + Sync + 'static,
    {
        self.body_save_listeners.push(Box::new(listener));
    }

    /// Skips garbage collection if `token` was cancelled before the crawl ended
    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub fn store(&self) -> &MirrorStore {
        &self.store
    }

    pub fn stats(&self) -> MirrorStats {
        self.store.stats()
    }

    fn link_options(&self) -> LinkOptions {
        LinkOptions {
            extract_href: true,
            extract_src: true,
            look_in_css: true,
            rewrite_urls: self.rewrite_links,
        }
    }
}

impl Application for Webmirror {
    fn prepare(&mut self, start: &Url, spider: &mut Spider, queue: &mut QueueHandle<'_>) -> Result<()> {
        restrict_to_host(spider.fetch_filter_mut(), start);

        for url in &self.additional_urls {
            if let Ok(false) = queue.add_url(url, false) {
                tracing::debug!("Additional URL {} already queued", url);
            }
        }

        self.store.write_archive_marker(Local::now())?;
        tracing::info!("Mirroring {} into {}", start, self.store.root().display());
        Ok(())
    }

    fn handle_response(&mut self, event: &ResponseEvent, spider: &mut Spider, queue: &mut QueueHandle<'_>) {
        let content_type = event.content_type();
        let options = self.link_options();
        let discovery = spider.discover_links(
            queue,
            &event.request_url,
            content_type.as_deref(),
            event.body(),
            &options,
        );

        let mut body = discovery.body.unwrap_or_else(|| event.body().to_vec());
        for listener in &self.body_save_listeners {
            body = listener(content_type.as_deref(), body);
        }

        let last_modified = event.response.last_modified();
        if let Err(e) = self
            .store
            .save(&event.request_url, content_type.as_deref(), &body, last_modified)
        {
            tracing::error!("Could not save {}: {}", event.request_url, e);
        }
    }

    fn handle_redirect(&mut self, event: &RedirectEvent, spider: &mut Spider, queue: &mut QueueHandle<'_>) {
        let Some(target) = spider.handle_redirect(queue, event) else {
            return;
        };
        if target.host_str() == event.request_url.host_str() {
            self.store.record_redirect(&event.request_url, &target);
        }
    }

    fn finish(&mut self, _spider: &Spider) -> Result<()> {
        if self.cancel.as_ref().is_some_and(CancellationToken::is_cancelled) {
            tracing::warn!("Crawl cancelled, keeping files of earlier runs");
        } else {
            self.store.collect_garbage()?;
        }

        let stats = self.store.stats();
        tracing::info!(
            "Mirror complete: {} written, {} linked, {} unchanged, {} aliases, {} deleted, {} errors",
            stats.written,
            stats.linked,
            stats.skipped,
            stats.symlinked,
            stats.deleted,
            stats.errors
        );
        Ok(())
    }
}
