//! Fetch scheduler
//!
//! This module handles:
//! - Normalizing and enqueueing URLs
//! - Draining the queue serially or with a bounded number of requests in flight
//! - Classifying completions into response, redirect and exception events
//! - Dispatching each event to the listener before the next completion is polled
//!
//! All requests of a run are driven from one task. Completions are processed
//! one at a time, so listeners never run concurrently and shared crawl state
//! needs no locking.

use crate::config::SpiderConfig;
use crate::crawler::events::{FetchEvent, FetchListener};
use crate::crawler::transport::{FetchRequest, HttpResponse, Transport, TransportError};
use crate::queue::{Queue, UrlQueue};
use crate::state::EntryState;
use crate::url::{normalize, normalize_url};
use crate::{ConfigError, UrlError};
use futures::stream::{FuturesUnordered, StreamExt};
use reqwest::Method;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Scheduler settings
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    /// Maximum number of requests in flight; 1 selects the serial strategy
    pub concurrency: usize,

    pub method: Method,

    /// Per-request timeout
    pub timeout: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency: 1,
            method: Method::GET,
            timeout: None,
        }
    }
}

impl SchedulerConfig {
    /// Builds scheduler settings from the `[spider]` section
    pub fn from_config(config: &SpiderConfig) -> Result<Self, ConfigError> {
        let method = Method::from_bytes(config.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| ConfigError::Validation(format!("Invalid method '{}'", config.method)))?;

        Ok(Self {
            concurrency: config.concurrency.max(1) as usize,
            method,
            timeout: (config.timeout_secs > 0).then(|| Duration::from_secs(config.timeout_secs)),
        })
    }
}

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunState {
    Idle,
    Running,
}

/// Counters collected over one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Requests dispatched to the transport
    pub requests: usize,
    pub responses: usize,
    pub redirects: usize,
    pub exceptions: usize,

    /// Highest number of requests observed in flight at once
    pub peak_in_flight: usize,
}

impl RunStats {
    fn record(&mut self, event: &FetchEvent) {
        match event {
            FetchEvent::Response(_) => self.responses += 1,
            FetchEvent::Redirect(_) => self.redirects += 1,
            FetchEvent::Exception(_) => self.exceptions += 1,
        }
    }
}

/// Write access to the queue for listeners and consumers
///
/// Every URL is normalized before it reaches the queue; anything that is not
/// an absolute HTTP(S) URL is refused with a warning.
pub struct QueueHandle<'a> {
    queue: &'a mut dyn Queue,
}

impl<'a> QueueHandle<'a> {
    pub fn new(queue: &'a mut dyn Queue) -> Self {
        Self { queue }
    }

    /// Normalizes and enqueues a URL string
    ///
    /// Returns `Ok(false)` when the queue already knows the URL.
    pub fn add_url(&mut self, url: &str, force: bool) -> Result<bool, UrlError> {
        let normalized = normalize_url(url).map_err(|e| {
            tracing::warn!("Refusing to queue {}: {}", url, e);
            e
        })?;
        Ok(self.queue.add_url(normalized.as_str(), force))
    }

    /// Normalizes and enqueues an already parsed URL
    pub fn add(&mut self, url: &Url, force: bool) -> Result<bool, UrlError> {
        let normalized = normalize(url.clone()).map_err(|e| {
            tracing::warn!("Refusing to queue {}: {}", url, e);
            e
        })?;
        Ok(self.queue.add_url(normalized.as_str(), force))
    }

    pub fn is_queued(&self, url: &str) -> bool {
        self.queue.is_queued(url)
    }

    pub fn is_visited(&self, url: &str) -> bool {
        self.queue.is_visited(url)
    }

    /// Number of URLs waiting
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

/// Drains a [`Queue`] through a [`Transport`] under a concurrency cap
pub struct FetchScheduler<T: Transport> {
    transport: Arc<T>,
    queue: Box<dyn Queue>,
    config: SchedulerConfig,

    /// Dispatch count per URL currently awaiting completion
    in_flight: HashMap<String, usize>,

    state: RunState,
    cancel: Option<CancellationToken>,
}

impl<T: Transport> FetchScheduler<T> {
    /// Creates a scheduler over an empty [`UrlQueue`]
    pub fn new(transport: T, config: SchedulerConfig) -> Self {
        Self::with_queue(transport, Box::new(UrlQueue::new()), config)
    }

    /// Creates a scheduler over a caller-supplied queue
    pub fn with_queue(transport: T, queue: Box<dyn Queue>, config: SchedulerConfig) -> Self {
        Self {
            transport: Arc::new(transport),
            queue,
            config,
            in_flight: HashMap::new(),
            state: RunState::Idle,
            cancel: None,
        }
    }

    /// Stops dispatching new requests once `token` is cancelled
    ///
    /// Requests already in flight are still awaited and dispatched.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn set_cancellation(&mut self, token: CancellationToken) {
        self.cancel = Some(token);
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Normalizes and enqueues a URL
    ///
    /// Fails for anything but an absolute HTTP(S) URL. While a run is in
    /// progress, URLs are added through the listener's [`QueueHandle`] instead.
    pub fn add_url(&mut self, url: &str, force: bool) -> Result<bool, UrlError> {
        self.queue_handle().add_url(url, force)
    }

    /// Returns a handle for enqueueing outside of a run
    pub fn queue_handle(&mut self) -> QueueHandle<'_> {
        QueueHandle::new(self.queue.as_mut())
    }

    /// Reports where a URL is in its lifecycle, or `None` if never queued
    pub fn entry_state(&self, url: &str) -> Option<EntryState> {
        let key: String = normalize_url(url)
            .map(String::from)
            .unwrap_or_else(|_| url.to_string());

        if self.in_flight.contains_key(&key) {
            Some(EntryState::InFlight)
        } else if self.queue.is_queued(&key) {
            Some(EntryState::Queued)
        } else if self.queue.is_visited(&key) {
            Some(EntryState::Visited)
        } else {
            None
        }
    }

    /// Drains the queue, dispatching one event per completed request
    ///
    /// Returns when the queue is empty and nothing is in flight, or when the
    /// cancellation token fired and in-flight requests have settled.
    pub async fn run<L>(&mut self, listener: &mut L) -> RunStats
    where
        L: FetchListener + ?Sized,
    {
        self.state = RunState::Running;
        tracing::info!(
            "Starting fetch run with {} queued URLs, concurrency {}",
            self.queue.len(),
            self.config.concurrency
        );

        let stats = if self.config.concurrency <= 1 {
            self.run_serial(listener).await
        } else {
            self.run_concurrent(listener).await
        };

        self.state = RunState::Idle;
        tracing::info!(
            "Fetch run finished: {} requests, {} responses, {} redirects, {} exceptions",
            stats.requests,
            stats.responses,
            stats.redirects,
            stats.exceptions
        );
        stats
    }

    async fn run_serial<L>(&mut self, listener: &mut L) -> RunStats
    where
        L: FetchListener + ?Sized,
    {
        let mut stats = RunStats::default();

        while !self.is_cancelled() {
            let Some((url, request)) = self.next_request() else {
                break;
            };

            stats.requests += 1;
            stats.peak_in_flight = stats.peak_in_flight.max(1);
            let result = self.transport.fetch(request).await;
            self.complete(url, result, listener, &mut stats);
        }

        stats
    }

    async fn run_concurrent<L>(&mut self, listener: &mut L) -> RunStats
    where
        L: FetchListener + ?Sized,
    {
        let mut stats = RunStats::default();
        let mut pending = FuturesUnordered::new();

        loop {
            if !self.is_cancelled() {
                while pending.len() < self.config.concurrency {
                    let Some((url, request)) = self.next_request() else {
                        break;
                    };
                    stats.requests += 1;
                    pending.push(fetch_one(Arc::clone(&self.transport), url, request));
                }
            }
            stats.peak_in_flight = stats.peak_in_flight.max(pending.len());

            // Waits for at least one completion; None once nothing is in flight
            let Some((url, result)) = pending.next().await else {
                break;
            };
            self.complete(url, result, listener, &mut stats);
        }

        stats
    }

    /// Pops the next URL and builds its request, marking it in flight
    fn next_request(&mut self) -> Option<(Url, FetchRequest)> {
        loop {
            let raw = self.queue.next()?;
            let url = match Url::parse(&raw) {
                Ok(url) => url,
                Err(e) => {
                    tracing::warn!("Skipping unparseable queued URL {}: {}", raw, e);
                    continue;
                }
            };

            *self.in_flight.entry(raw).or_insert(0) += 1;
            tracing::debug!("Fetching {}", url);

            let request = FetchRequest {
                url: url.clone(),
                method: self.config.method.clone(),
                timeout: self.config.timeout,
            };
            return Some((url, request));
        }
    }

    fn complete<L>(
        &mut self,
        url: Url,
        result: Result<HttpResponse, TransportError>,
        listener: &mut L,
        stats: &mut RunStats,
    ) where
        L: FetchListener + ?Sized,
    {
        if let Some(count) = self.in_flight.get_mut(url.as_str()) {
            *count -= 1;
            if *count == 0 {
                self.in_flight.remove(url.as_str());
            }
        }

        let event = FetchEvent::classify(url, result);
        stats.record(&event);
        listener.on_event(&event, &mut QueueHandle::new(self.queue.as_mut()));
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }
}

async fn fetch_one<T: Transport>(
    transport: Arc<T>,
    url: Url,
    request: FetchRequest,
) -> (Url, Result<HttpResponse, TransportError>) {
    let result = transport.fetch(request).await;
    (url, result)
}
