//! Live-state synchronization - keeps the overlay files on the active slide

mod engine;

pub use engine::{create_engine_channels, ConnectionManager};

/// Commands that can be sent to the connection manager
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Stop after the current message has been handled
    Shutdown,
}

/// Status updates from the connection manager
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineStatus {
    /// Attempting to connect (1-based attempt counter)
    Connecting { attempt: u64 },
    /// Connected and subscribed
    Connected,
    /// Connection ended, a reconnect follows after the delay
    Disconnected,
    /// Output files now show this slide
    SlideSynced(u32),
    /// Presentation mode ended, REST session was reset
    PresentationClosed,
}
