//! Crawl driver
//!
//! A [`Crawler`] ties together the fetch scheduler, the discovery [`Spider`]
//! and one [`Application`], the consumer deciding what happens to fetched
//! documents. It seeds the queue, runs the scheduler to completion and gives
//! the application a final hook once nothing is left to fetch.

use crate::config::Config;
use crate::crawler::events::{
    ExceptionEvent, FetchEvent, FetchListener, ListenerSet, RedirectEvent, ResponseEvent,
};
use crate::crawler::scheduler::{FetchScheduler, QueueHandle, RunStats, SchedulerConfig};
use crate::crawler::spider::{RejectedUrl, Spider};
use crate::crawler::transport::{ReqwestTransport, Transport};
use crate::url::normalize_url;
use crate::Result;
use tokio_util::sync::CancellationToken;
use url::Url;

/// A consumer of crawl events
///
/// Only [`Application::handle_response`] is required; the other hooks default
/// to following redirects, logging failures and ignoring rejected URLs.
pub trait Application {
    /// Called once before the start URL is queued
    ///
    /// Typically restricts the spider's filters to the start host or queues
    /// additional URLs.
    fn prepare(
        &mut self,
        start: &Url,
        spider: &mut Spider,
        queue: &mut QueueHandle<'_>,
    ) -> Result<()> {
        let _ = (start, spider, queue);
        Ok(())
    }

    /// Called for every successful, non-redirect response
    fn handle_response(
        &mut self,
        event: &ResponseEvent,
        spider: &mut Spider,
        queue: &mut QueueHandle<'_>,
    );

    /// Called for every redirect; follows it by default
    fn handle_redirect(
        &mut self,
        event: &RedirectEvent,
        spider: &mut Spider,
        queue: &mut QueueHandle<'_>,
    ) {
        spider.handle_redirect(queue, event);
    }

    /// Called for every failed request; logs it by default
    fn handle_exception(&mut self, event: &ExceptionEvent, spider: &Spider) {
        spider.log_exception(event);
    }

    /// Called for every URL the fetch filter refused
    fn handle_rejected_url(&mut self, rejected: &RejectedUrl) {
        tracing::debug!("Skipping URL {}", rejected.url);
    }

    /// Called once after the run, when the queue is empty and nothing is in flight
    fn finish(&mut self, spider: &Spider) -> Result<()> {
        let _ = spider;
        Ok(())
    }
}

/// Per-run state handed to the scheduler as its listener
struct CrawlContext<A> {
    spider: Spider,
    app: A,
    listeners: ListenerSet,
}

impl<A: Application> CrawlContext<A> {
    fn drain_rejected(&mut self) {
        for rejected in self.spider.take_rejected() {
            self.app.handle_rejected_url(&rejected);
        }
    }
}

impl<A: Application> FetchListener for CrawlContext<A> {
    fn on_event(&mut self, event: &FetchEvent, queue: &mut QueueHandle<'_>) {
        match event {
            FetchEvent::Response(e) => self.app.handle_response(e, &mut self.spider, queue),
            FetchEvent::Redirect(e) => self.app.handle_redirect(e, &mut self.spider, queue),
            FetchEvent::Exception(e) => self.app.handle_exception(e, &self.spider),
        }
        self.drain_rejected();
        self.listeners.on_event(event, queue);
    }
}

/// Runs one application over a crawl
pub struct Crawler<A, T: Transport = ReqwestTransport> {
    scheduler: FetchScheduler<T>,
    context: CrawlContext<A>,
}

impl<A: Application> Crawler<A, ReqwestTransport> {
    /// Builds a crawler with a `reqwest` transport from a configuration
    pub fn from_config(config: &Config, app: A) -> Result<Self> {
        let transport = ReqwestTransport::new(&config.spider.user_agent)?;
        let scheduler = FetchScheduler::new(transport, SchedulerConfig::from_config(&config.spider)?);
        let spider = Spider::from_config(config)?;
        Ok(Self::new(scheduler, spider, app))
    }
}

impl<A: Application, T: Transport> Crawler<A, T> {
    pub fn new(scheduler: FetchScheduler<T>, spider: Spider, app: A) -> Self {
        Self {
            scheduler,
            context: CrawlContext {
                spider,
                app,
                listeners: ListenerSet::new(),
            },
        }
    }

    /// Stops the crawl from dispatching new requests once `token` is cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.scheduler.set_cancellation(token);
        self
    }

    /// Registers an extra listener; it runs after the application
    pub fn add_listener<L>(&mut self, listener: L)
    where
        L: FetchListener + Send + 'static,
    {
        self.context.listeners.push(listener);
    }

    pub fn spider(&self) -> &Spider {
        &self.context.spider
    }

    pub fn spider_mut(&mut self) -> &mut Spider {
        &mut self.context.spider
    }

    pub fn app(&self) -> &A {
        &self.context.app
    }

    pub fn app_mut(&mut self) -> &mut A {
        &mut self.context.app
    }

    pub fn scheduler(&self) -> &FetchScheduler<T> {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut FetchScheduler<T> {
        &mut self.scheduler
    }

    pub fn into_app(self) -> A {
        self.context.app
    }

    /// Crawls from `start_url` until the queue drains
    ///
    /// Only an invalid start URL or a failing `prepare`/`finish` hook is an
    /// error; failures of individual requests reach the application as events.
    pub async fn crawl(&mut self, start_url: &str) -> Result<RunStats> {
        let start = normalize_url(start_url)?;
        tracing::info!("Starting crawl at {}", start);

        {
            let mut queue = self.scheduler.queue_handle();
            self.context
                .app
                .prepare(&start, &mut self.context.spider, &mut queue)?;
            queue.add(&start, false)?;
        }
        self.context.drain_rejected();

        let stats = self.scheduler.run(&mut self.context).await;

        self.context.app.finish(&self.context.spider)?;
        tracing::info!("Crawl of {} complete", start);

        Ok(stats)
    }
}
