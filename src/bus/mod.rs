//! Notification bus
//!
//! Process-wide publish/subscribe channel for transient outcomes. One topic,
//! `flash`, carries banner messages from whoever produced them to the banner
//! view, decoupled from the component that triggered them.
//!
//! Constructed once at startup and passed by reference (it is cheap to
//! clone). No queuing for absent consumers: publishing with nobody
//! subscribed drops the event.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, trace, warn};

/// Topic name of banner messages
pub const FLASH_TOPIC: &str = "flash";

/// Banner severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    #[default]
    Success,
    Info,
    Warning,
    Error,
}

/// One banner event
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlashMessage {
    pub message: String,
    pub subtitle: String,
    pub kind: FlashKind,
}

impl FlashMessage {
    pub fn new(message: impl Into<String>, subtitle: impl Into<String>, kind: FlashKind) -> Self {
        Self {
            message: message.into(),
            subtitle: subtitle.into(),
            kind,
        }
    }
}

/// Broadcast channel for the `flash` topic
#[derive(Clone)]
pub struct NotificationBus {
    sender: broadcast::Sender<FlashMessage>,
}

impl NotificationBus {
    /// Create a new bus with default capacity
    pub fn new() -> Self {
        Self::with_capacity(16)
    }

    /// Create a new bus with specified capacity
    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish a banner; returns how many consumers received it
    pub fn publish(&self, message: FlashMessage) -> usize {
        trace!(topic = FLASH_TOPIC, message = ?message, "Publishing flash");
        // No subscribers: the event is dropped
        self.sender.send(message).unwrap_or(0)
    }

    pub fn success(&self, message: impl Into<String>, subtitle: impl Into<String>) -> usize {
        self.publish(FlashMessage::new(message, subtitle, FlashKind::Success))
    }

    pub fn error(&self, message: impl Into<String>, subtitle: impl Into<String>) -> usize {
        self.publish(FlashMessage::new(message, subtitle, FlashKind::Error))
    }

    /// Subscribe to banners published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<FlashMessage> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for NotificationBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Spawn a background consumer that logs every banner
pub fn spawn_flash_logger(bus: Arc<NotificationBus>) -> tokio::task::JoinHandle<()> {
    let mut receiver = bus.subscribe();

    tokio::spawn(async move {
        loop {
            match receiver.recv().await {
                Ok(flash) => match flash.kind {
                    FlashKind::Error | FlashKind::Warning => {
                        warn!(message = %flash.message, subtitle = %flash.subtitle, "Flash");
                    }
                    FlashKind::Success | FlashKind::Info => {
                        info!(message = %flash.message, subtitle = %flash.subtitle, "Flash");
                    }
                },
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    debug!(skipped = n, "Flash logger lagged, skipped banners");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    debug!("Notification bus closed, stopping flash logger");
                    break;
                }
            }
        }
    })
}
