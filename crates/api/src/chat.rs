//! In-process fan-out of chat events to WebSocket subscribers.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::entities::chat::ChatMessage;

const CHANNEL_CAPACITY: usize = 256;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
  Message(ChatMessage),
  Typing {
    project_id: Uuid,
    user_id: Uuid,
    username: String,
  },
}

impl ChatEvent {
  pub fn project_id(&self) -> Uuid {
    match self {
      ChatEvent::Message(message) => message.project_id,
      ChatEvent::Typing { project_id, .. } => *project_id,
    }
  }
}

/// One broadcast channel for every project. Subscribers filter by project id.
#[derive(Debug, Clone)]
pub struct ChatHub {
  tx: broadcast::Sender<ChatEvent>,
}

impl Default for ChatHub {
  fn default() -> Self {
    Self::new(CHANNEL_CAPACITY)
  }
}

impl ChatHub {
  pub fn new(capacity: usize) -> Self {
    let (tx, _) = broadcast::channel(capacity);
    Self { tx }
  }

  pub fn publish(&self, event: ChatEvent) {
    // No receivers simply means nobody has the chat open.
    let receivers = self.tx.send(event).unwrap_or(0);
    trace!("Chat event delivered to {} subscribers", receivers);
  }

  pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
    self.tx.subscribe()
  }
}
