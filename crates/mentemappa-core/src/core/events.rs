//! Application events for front-ends.
//!
//! The send handler publishes these while an exchange runs so a front-end can
//! redraw without polling the conversation store.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use super::conversation::MessageId;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppEvent {
    /// User message and reply placeholder were appended; loading is on.
    ExchangeStarted { user_id: MessageId, reply_id: MessageId },

    /// A fragment arrived. `text` is the raw reply so far, `outline` its
    /// sanitized view as handed to the renderer.
    ReplyUpdated {
        reply_id: MessageId,
        text: String,
        outline: String,
    },

    /// The reply finished normally; loading is off.
    ExchangeCompleted { reply_id: MessageId },

    /// The exchange failed; an error entry was appended and loading is off.
    ExchangeFailed { error_id: MessageId, cause: String },
}

pub type AppEventTx = mpsc::Sender<Arc<AppEvent>>;

pub type AppEventRx = mpsc::Receiver<Arc<AppEvent>>;

/// Default channel capacity for event streams.
pub const DEFAULT_EVENT_CHANNEL_CAPACITY: usize = 128;

pub fn create_event_channel() -> (AppEventTx, AppEventRx) {
    mpsc::channel(DEFAULT_EVENT_CHANNEL_CAPACITY)
}

/// Event sender with best-effort and reliable send modes.
///
/// `send_delta()` is for per-fragment updates that a slow consumer can miss
/// (the next update carries the full text anyway). `send_important()` is for
/// lifecycle events that must arrive.
#[derive(Clone)]
pub struct EventSender {
    tx: AppEventTx,
}

impl EventSender {
    pub fn new(tx: AppEventTx) -> Self {
        Self { tx }
    }

    /// Best-effort send: never awaits, drops if channel is full.
    pub fn send_delta(&self, ev: AppEvent) {
        let _ = self.tx.try_send(Arc::new(ev));
    }

    /// Reliable send: awaits delivery. A closed receiver is ignored.
    pub async fn send_important(&self, ev: AppEvent) {
        let _ = self.tx.send(Arc::new(ev)).await;
    }
}
