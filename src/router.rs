//! Explicit routing of push events to the components that handle them.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::cache::{ChatCollection, EventSink, MessageCollection, SubjectCollection};
use crate::error::Result;
use crate::event::PushEvent;

/// Components register here; nothing is discovered implicitly.
#[derive(Default)]
pub struct PushRouter {
  subjects: Option<Arc<SubjectCollection>>,
  chats: Option<Arc<ChatCollection>>,
  messages: HashMap<i64, Arc<MessageCollection>>,
}

impl PushRouter {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn register_subjects(&mut self, subjects: Arc<SubjectCollection>) {
    self.subjects = Some(subjects);
  }

  pub fn register_chats(&mut self, chats: Arc<ChatCollection>) {
    self.chats = Some(chats);
  }

  /// Route a chat's messages to `history`, replacing any earlier registration.
  pub fn register_messages(&mut self, history: Arc<MessageCollection>) {
    self.messages.insert(history.chat_id(), history);
  }

  pub fn unregister_messages(&mut self, chat_id: i64) -> Option<Arc<MessageCollection>> {
    self.messages.remove(&chat_id)
  }

  /// Apply one event. Returns false when no registered component handles it.
  pub async fn dispatch(&self, event: &PushEvent) -> Result<bool> {
    let handled = match event {
      e if SubjectCollection::handles(e) => match &self.subjects {
        Some(subjects) => {
          subjects.apply(e).await?;
          true
        }
        None => false,
      },
      PushEvent::PresenceChanged { .. }
      | PushEvent::PhotoUpdated { .. }
      | PushEvent::SessionCreated { .. }
      | PushEvent::SessionClosed { .. } => match &self.chats {
        Some(chats) => {
          chats.apply_event(event).await?;
          true
        }
        None => false,
      },
      PushEvent::MessageReceived { chat_id, .. } => match self.messages.get(chat_id) {
        Some(history) => {
          history.apply_event(event).await?;
          true
        }
        None => false,
      },
      _ => false,
    };

    if !handled {
      debug!(event = event.kind(), "no component registered for event");
    }
    Ok(handled)
  }
}
