//! OpenSong automation server client
//!
//! OpenSong pushes presentation status over a WebSocket and serves slide
//! content over a small REST API on the same host and port.

mod api;
mod message;
#[cfg(test)]
pub(crate) mod mock;
mod tracker;

pub use api::{FetchError, SlideFetcher};
pub use message::PushMessage;
pub use tracker::{PresentationTracker, TrackerEvent};

/// First message sent after connecting, subscribes to presentation events
pub const SUBSCRIBE_PRESENTATION: &str = "/ws/subscribe/presentation";
