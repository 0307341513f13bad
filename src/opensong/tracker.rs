//! Presentation state tracking
//!
//! Turns the stream of push messages into slide transitions. Only the
//! engine's dispatch path touches the tracker, one message at a time.

use tracing::info;

use super::message::{Acknowledgement, PushMessage, StatusUpdate};

/// Last known presentation state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationState {
    pub running: bool,
    pub slide_number: u32,
}

/// What a message means for the overlay
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerEvent {
    /// Informational message, nothing changed
    Idle,
    /// Status repeated the current slide
    SameSlide,
    /// Active slide changed
    Transition(u32),
    /// Presentation mode is off; the REST session should be reset
    Closed,
}

impl TrackerEvent {
    /// Slide to fetch for this event, if any. Slide 0 means "no active slide".
    pub fn slide_to_fetch(&self) -> Option<u32> {
        match *self {
            TrackerEvent::Transition(n) if n > 0 => Some(n),
            _ => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct PresentationTracker {
    state: PresentationState,
}

impl PresentationTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> PresentationState {
        self.state
    }

    /// Forget everything, used when a fresh connection is established
    pub fn reset(&mut self) {
        self.state = PresentationState::default();
    }

    /// Update state from a message and classify it
    pub fn handle(&mut self, message: &PushMessage) -> TrackerEvent {
        match message {
            PushMessage::Ack(Acknowledgement::AlreadySubscribed) => {
                info!("Client is already subscribed to the WebSocket, waiting for new messages...");
                TrackerEvent::Idle
            }
            PushMessage::Ack(Acknowledgement::Ok) => {
                info!("Client is connected and OpenSong is running");
                TrackerEvent::Idle
            }
            PushMessage::Other(text) => {
                info!("Received unknown non-XML response: {}", text);
                TrackerEvent::Idle
            }
            PushMessage::Status(update) => self.apply(*update),
        }
    }

    fn apply(&mut self, update: StatusUpdate) -> TrackerEvent {
        self.state.running = update.running;

        if !update.running {
            info!("Presentation is not running");
            return TrackerEvent::Closed;
        }

        let previous = self.state.slide_number;
        if previous == update.slide_number {
            info!("WebSocket received update, slide remains at: '{}'", previous);
            return TrackerEvent::SameSlide;
        }

        info!(
            "WebSocket received update, transitioned from slide '{}' to slide '{}'",
            previous, update.slide_number
        );
        self.state.slide_number = update.slide_number;
        TrackerEvent::Transition(update.slide_number)
    }
}
