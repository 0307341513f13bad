//! Connection manager
//!
//! Owns the OpenSong WebSocket lifecycle: connect, subscribe, dispatch each
//! message to the presentation tracker, and reconnect after a fixed delay
//! whenever the connection fails or closes. A slide transition runs
//! fetch → parse → write to completion before the next message is read, so
//! the overlay files never go back to an older slide.

use anyhow::Result;
use futures::{SinkExt, StreamExt};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::opensong::{
    FetchError, PresentationTracker, PushMessage, SlideFetcher, TrackerEvent,
    SUBSCRIBE_PRESENTATION,
};
use crate::output::OutputWriter;
use crate::slide::parse_slide;

use super::{EngineCommand, EngineStatus};

type PushStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

/// Result of one connection attempt
enum ConnectOutcome {
    Connected(PushStream),
    Failed(String),
    Shutdown,
}

/// How a connected session ended
#[derive(Debug, Clone, PartialEq, Eq)]
enum SessionOutcome {
    /// Server closed the stream normally
    Closed,
    /// Connect failure, abrupt disconnect or REST transport failure
    Failed(String),
    /// Shutdown was requested
    Shutdown,
}

enum SessionEvent {
    Command(Option<EngineCommand>),
    Frame(Option<Result<Message, tungstenite::Error>>),
}

/// Keeps the overlay files in sync with the live OpenSong presentation
pub struct ConnectionManager {
    /// WebSocket endpoint
    ws_url: String,
    /// Pause between a lost connection and the next attempt
    reconnect_delay: Duration,
    /// Presentation state, reset on every connection
    tracker: PresentationTracker,
    /// REST client, exclusively owned here
    fetcher: SlideFetcher,
    /// Overlay file writer
    writer: OutputWriter,
    /// Command receiver
    cmd_rx: mpsc::Receiver<EngineCommand>,
    /// Status broadcaster
    status_tx: broadcast::Sender<EngineStatus>,
}

impl ConnectionManager {
    /// Create a connection manager for the validated config
    pub fn new(
        config: &Config,
        cmd_rx: mpsc::Receiver<EngineCommand>,
        status_tx: broadcast::Sender<EngineStatus>,
    ) -> Self {
        Self {
            ws_url: config.opensong.ws_url(),
            reconnect_delay: config.opensong.reconnect_delay,
            tracker: PresentationTracker::new(),
            fetcher: SlideFetcher::new(config.opensong.api_base(), config.opensong.request_timeout),
            writer: OutputWriter::new(config.output.clone()),
            cmd_rx,
            status_tx,
        }
    }

    /// Run until shutdown, reconnecting forever
    pub async fn run(&mut self) -> Result<()> {
        info!("Connection manager starting for '{}'", self.ws_url);
        debug!("Overlay files: {:?}", self.writer.destination());

        if let Err(e) = self.writer.clear().await {
            error!("Failed to clear overlay files: {}", e);
        }

        let mut attempt: u64 = 0;
        let mut consecutive_failures: u32 = 0;

        loop {
            attempt += 1;
            self.publish(EngineStatus::Connecting { attempt });

            let outcome = match self.connect().await {
                ConnectOutcome::Connected(stream) => {
                    info!("Connected to '{}'", self.ws_url);
                    consecutive_failures = 0;
                    self.tracker.reset();
                    self.publish(EngineStatus::Connected);
                    self.run_session(stream).await
                }
                ConnectOutcome::Failed(reason) => SessionOutcome::Failed(reason),
                ConnectOutcome::Shutdown => SessionOutcome::Shutdown,
            };

            self.fetcher.close();
            debug!("Session ended with state {:?}", self.tracker.state());

            match outcome {
                SessionOutcome::Shutdown => {
                    info!("Connection manager shutting down");
                    break;
                }
                SessionOutcome::Closed => {
                    info!("Disconnected from websocket");
                }
                SessionOutcome::Failed(reason) => {
                    consecutive_failures = consecutive_failures.saturating_add(1);
                    if consecutive_failures == 1 {
                        info!("Connection to '{}' lost or unavailable: {}", self.ws_url, reason);
                    } else {
                        debug!(
                            "Connection attempt {} to '{}' failed: {}",
                            attempt, self.ws_url, reason
                        );
                    }
                }
            }
            self.publish(EngineStatus::Disconnected);

            if self.wait_before_reconnect().await {
                info!("Connection manager shutting down");
                break;
            }
        }

        Ok(())
    }

    async fn connect(&mut self) -> ConnectOutcome {
        let result = tokio::select! {
            _ = self.cmd_rx.recv() => return ConnectOutcome::Shutdown,
            result = connect_async(self.ws_url.as_str()) => result,
        };

        match result {
            Ok((stream, _response)) => ConnectOutcome::Connected(stream),
            Err(e) => ConnectOutcome::Failed(e.to_string()),
        }
    }

    /// Sleep for the reconnect delay; true if shutdown was requested meanwhile
    async fn wait_before_reconnect(&mut self) -> bool {
        tokio::select! {
            _ = tokio::time::sleep(self.reconnect_delay) => false,
            _ = self.cmd_rx.recv() => true,
        }
    }

    async fn run_session(&mut self, stream: PushStream) -> SessionOutcome {
        let (mut sink, mut frames) = stream.split();

        if let Err(e) = sink
            .send(Message::Text(SUBSCRIBE_PRESENTATION.to_string()))
            .await
        {
            return SessionOutcome::Failed(format!("Failed to subscribe: {}", e));
        }
        info!("Sent presentation subscription to WebSocket");

        loop {
            let event = tokio::select! {
                cmd = self.cmd_rx.recv() => SessionEvent::Command(cmd),
                frame = frames.next() => SessionEvent::Frame(frame),
            };

            match event {
                SessionEvent::Command(Some(EngineCommand::Shutdown)) | SessionEvent::Command(None) => {
                    if let Err(e) = sink.close().await {
                        debug!("Failed to close WebSocket cleanly: {}", e);
                    }
                    return SessionOutcome::Shutdown;
                }
                SessionEvent::Frame(None) => return SessionOutcome::Closed,
                SessionEvent::Frame(Some(Err(e))) => return SessionOutcome::Failed(e.to_string()),
                SessionEvent::Frame(Some(Ok(Message::Text(text)))) => {
                    if let Err(e) = self.dispatch(&text).await {
                        return SessionOutcome::Failed(e.to_string());
                    }
                }
                SessionEvent::Frame(Some(Ok(Message::Close(frame)))) => {
                    debug!("Server closed the WebSocket: {:?}", frame);
                    return SessionOutcome::Closed;
                }
                SessionEvent::Frame(Some(Ok(Message::Binary(data)))) => {
                    debug!("Ignoring {} byte binary frame", data.len());
                }
                SessionEvent::Frame(Some(Ok(_))) => {}
            }
        }
    }

    /// Handle one text message from OpenSong
    async fn dispatch(&mut self, text: &str) -> Result<(), FetchError> {
        let message = PushMessage::classify(text);
        let event = self.tracker.handle(&message);

        if event == TrackerEvent::Closed {
            // Never carry a REST session across a presentation close
            if let Err(e) = self.fetcher.reset_connection() {
                warn!("Failed to reset REST session: {}", e);
            }
            self.publish(EngineStatus::PresentationClosed);
            return Ok(());
        }

        if let Some(slide) = event.slide_to_fetch() {
            self.sync_slide(slide).await?;
        }
        Ok(())
    }

    /// Fetch, parse and write one slide
    async fn sync_slide(&mut self, slide: u32) -> Result<(), FetchError> {
        let raw = self.fetcher.fetch_slide(slide).await?;
        let content = parse_slide(&raw);
        if content.is_empty() {
            info!("Slide {} has no title or verse text", slide);
        }

        match self.writer.write(&content).await {
            Ok(()) => {
                debug!(
                    "Slide {} written ({} verses)",
                    slide,
                    content.verses.len()
                );
                self.publish(EngineStatus::SlideSynced(slide));
            }
            Err(e) => error!("Failed to write overlay files for slide {}: {}", slide, e),
        }
        Ok(())
    }

    fn publish(&self, status: EngineStatus) {
        let _ = self.status_tx.send(status);
    }
}

/// Create command and status channels for the connection manager
pub fn create_engine_channels() -> (
    mpsc::Sender<EngineCommand>,
    mpsc::Receiver<EngineCommand>,
    broadcast::Sender<EngineStatus>,
    broadcast::Receiver<EngineStatus>,
) {
    let (cmd_tx, cmd_rx) = mpsc::channel(32);
    let (status_tx, status_rx) = broadcast::channel(64);
    (cmd_tx, cmd_rx, status_tx, status_rx)
}
