use crate::apps::restrict_to_host;
use crate::crawler::{Application, LinkOptions, QueueHandle, ResponseEvent, Spider};
use crate::Result;
use url::Url;

/// Receives every document the indexer fetches
pub trait IndexSink {
    fn index(&mut self, event: &ResponseEvent);
}

impl<F> IndexSink for F
where
    F: FnMut(&ResponseEvent),
{
    fn index(&mut self, event: &ResponseEvent) {
        self(event)
    }
}

/// Feeds a site into an [`IndexSink`]
///
/// Fetching is restricted to the start host; allow more hosts on the spider's
/// fetch filter.
pub struct Indexer<S> {
    sink: S,
    options: LinkOptions,
    indexed: usize,
}

impl<S: IndexSink> Indexer<S> {
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            options: LinkOptions::default(),
            indexed: 0,
        }
    }

    /// Also follow `src` attributes and stylesheet references
    pub fn with_link_options(mut self, options: LinkOptions) -> Self {
        self.options = options;
        self
    }

    /// Number of documents handed to the sink
    pub fn indexed(&self) -> usize {
        self.indexed
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }
}

impl<S: IndexSink> Application for Indexer<S> {
    fn prepare(&mut self, start: &Url, spider: &mut Spider, _queue: &mut QueueHandle<'_>) -> Result<()> {
        restrict_to_host(spider.fetch_filter_mut(), start);
        Ok(())
    }

    fn handle_response(&mut self, event: &ResponseEvent, spider: &mut Spider, queue: &mut QueueHandle<'_>) {
        self.sink.index(event);
        self.indexed += 1;

        let content_type = event.content_type();
        spider.discover_links(
            queue,
            &event.request_url,
            content_type.as_deref(),
            event.body(),
            &self.options,
        );
    }

    fn finish(&mut self, _spider: &Spider) -> Result<()> {
        tracing::info!("Indexed {} documents", self.indexed);
        Ok(())
    }
}
