//! State module for tracking crawl progress
//!
//! Every URL known to a crawl run is in exactly one [`EntryState`]:
//! queued, in flight, or visited.

mod entry_state;

pub use entry_state::EntryState;
