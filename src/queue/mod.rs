//! URL queue with visited/queued deduplication
//!
//! The [`Queue`] trait is the seam between the fetch scheduler and its
//! frontier; [`UrlQueue`] is the in-memory FIFO implementation used by default.

use std::collections::{HashSet, VecDeque};

/// A frontier of pending URLs plus the set of URLs already handed out
///
/// Implementations must guarantee at-most-once delivery per URL unless the
/// URL is re-added with `force`.
pub trait Queue: Send {
    /// Adds a URL unless it is already queued, or already visited and `force` is false
    ///
    /// Returns true if the URL was added.
    fn add_url(&mut self, url: &str, force: bool) -> bool;

    /// Removes and returns the head of the queue, marking it visited
    fn next(&mut self) -> Option<String>;

    /// Returns true if the URL is waiting in the queue
    fn is_queued(&self, url: &str) -> bool;

    /// Returns true if the URL has been handed out by [`Queue::next`]
    fn is_visited(&self, url: &str) -> bool;

    /// Returns the number of pending URLs
    fn len(&self) -> usize;

    /// Returns true if no URL is pending
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory FIFO URL queue
#[derive(Debug, Default)]
pub struct UrlQueue {
    pending: VecDeque<String>,
    queued: HashSet<String>,
    visited: HashSet<String>,
}

impl UrlQueue {
    /// Creates an empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of URLs handed out so far
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }
}

impl Queue for UrlQueue {
    fn add_url(&mut self, url: &str, force: bool) -> bool {
        if self.queued.contains(url) {
            tracing::debug!("URL {} is already queued", url);
            return false;
        }

        if !force && self.visited.contains(url) {
            tracing::debug!("URL {} has already been visited", url);
            return false;
        }

        self.pending.push_back(url.to_string());
        self.queued.insert(url.to_string());
        tracing::info!("URL {} added to spider queue", url);
        true
    }

    fn next(&mut self) -> Option<String> {
        let url = self.pending.pop_front()?;
        self.queued.remove(&url);
        self.visited.insert(url.clone());
        Some(url)
    }

    fn is_queued(&self, url: &str) -> bool {
        self.queued.contains(url)
    }

    fn is_visited(&self, url: &str) -> bool {
        self.visited.contains(url)
    }

    fn len(&self) -> usize {
        self.pending.len()
    }
}
