//! Fetch events and listener fan-out
//!
//! Every completed request produces exactly one [`FetchEvent`]. The scheduler
//! hands it to a single [`FetchListener`]; a [`ListenerSet`] fans it out to
//! several listeners in registration order.

use crate::crawler::scheduler::QueueHandle;
use crate::crawler::transport::{HttpResponse, TransportError};
use url::Url;

/// Status codes classified as redirects
pub const REDIRECT_STATUSES: [u16; 5] = [301, 302, 303, 307, 308];

/// Outcome of one request attempt
#[derive(Debug)]
pub enum FetchEvent {
    Response(ResponseEvent),
    Redirect(RedirectEvent),
    Exception(ExceptionEvent),
}

impl FetchEvent {
    /// Classifies a transport result for `request_url`
    pub fn classify(request_url: Url, result: Result<HttpResponse, TransportError>) -> Self {
        match result {
            Ok(response) if REDIRECT_STATUSES.contains(&response.status) => {
                FetchEvent::Redirect(RedirectEvent {
                    request_url,
                    status_code: response.status,
                    location: response.location().map(str::to_string),
                    response,
                })
            }
            Ok(response) => FetchEvent::Response(ResponseEvent {
                request_url,
                response,
            }),
            Err(error) => FetchEvent::Exception(ExceptionEvent { request_url, error }),
        }
    }

    /// Returns the URL whose request produced this event
    pub fn request_url(&self) -> &Url {
        match self {
            FetchEvent::Response(e) => &e.request_url,
            FetchEvent::Redirect(e) => &e.request_url,
            FetchEvent::Exception(e) => &e.request_url,
        }
    }
}

/// A successful, non-redirect response
#[derive(Debug)]
pub struct ResponseEvent {
    pub request_url: Url,
    pub response: HttpResponse,
}

impl ResponseEvent {
    /// Returns the media type, lower-cased and without parameters
    ///
    /// `text/HTML; charset=utf-8` becomes `text/html`.
    pub fn content_type(&self) -> Option<String> {
        self.response.content_type().and_then(media_type)
    }

    /// Returns the raw response body
    pub fn body(&self) -> &[u8] {
        &self.response.body
    }
}

/// A 301, 302, 303, 307 or 308 answer
#[derive(Debug)]
pub struct RedirectEvent {
    pub request_url: Url,
    pub status_code: u16,

    /// The `Location` header exactly as received, not yet resolved
    pub location: Option<String>,

    pub response: HttpResponse,
}

/// A failed request
#[derive(Debug)]
pub struct ExceptionEvent {
    pub request_url: Url,
    pub error: TransportError,
}

impl ExceptionEvent {
    /// Returns the response received before the failure, e.g. the body of a 404
    pub fn partial_response(&self) -> Option<&HttpResponse> {
        self.error.partial_response()
    }

    /// Returns the HTTP status if the failure was a status error
    pub fn status(&self) -> Option<u16> {
        self.error.status()
    }
}

/// Extracts the lower-cased media type from a `Content-Type` value
pub fn media_type(content_type: &str) -> Option<String> {
    let media = content_type.split(';').next()?.trim();
    if media.is_empty() {
        None
    } else {
        Some(media.to_ascii_lowercase())
    }
}

/// Receives fetch events from the scheduler
///
/// Listeners run one at a time on the scheduling loop and may enqueue new
/// URLs through the queue handle; those are picked up by the same run.
pub trait FetchListener {
    fn on_event(&mut self, event: &FetchEvent, queue: &mut QueueHandle<'_>);
}

/// Ordered collection of listeners
#[derive(Default)]
pub struct ListenerSet {
    listeners: Vec<Box<dyn FetchListener + Send>>,
}

impl ListenerSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a listener; listeners run in registration order
    pub fn push<L>(&mut self, listener: L)
    where
        L: FetchListener + Send + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    pub fn len(&self) -> usize {
        self.listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.listeners.is_empty()
    }
}

impl FetchListener for ListenerSet {
    fn on_event(&mut self, event: &FetchEvent, queue: &mut QueueHandle<'_>) {
        for listener in &mut self.listeners {
            listener.on_event(event, queue);
        }
    }
}
