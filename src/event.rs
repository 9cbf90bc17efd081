use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::trace;

/// Identifies the mark a grade event refers to and the scope it belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkEvent {
  pub mark_id: i64,
  pub subject_id: i64,
  pub student_id: i64,
}

/// Out-of-band notifications from the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
  TaskCreated {
    task_id: i64,
    subject_id: i64,
  },
  /// Completion toggled by the viewer; `completed: false` reopens the task
  TaskCompleted {
    task_id: i64,
    subject_id: i64,
    completed: bool,
  },
  MarkCreated(MarkEvent),
  MarkChanged(MarkEvent),
  MarkDeleted(MarkEvent),
  TimetableChanged {
    class_id: i64,
    date: NaiveDate,
  },
  PresenceChanged {
    user_id: i64,
    online: bool,
  },
  SessionCreated {
    chat_id: i64,
  },
  SessionClosed {
    chat_id: i64,
  },
  PhotoUpdated {
    user_id: i64,
    photo: Option<String>,
  },
  MessageReceived {
    chat_id: i64,
    message_id: i64,
  },
}

impl PushEvent {
  /// Subject the event is scoped to, for events routed through subjects
  pub fn subject_id(&self) -> Option<i64> {
    match self {
      Self::TaskCreated { subject_id, .. } | Self::TaskCompleted { subject_id, .. } => {
        Some(*subject_id)
      }
      Self::MarkCreated(e) | Self::MarkChanged(e) | Self::MarkDeleted(e) => Some(e.subject_id),
      _ => None,
    }
  }

  pub fn kind(&self) -> &'static str {
    match self {
      Self::TaskCreated { .. } => "task_created",
      Self::TaskCompleted { .. } => "task_completed",
      Self::MarkCreated(_) => "mark_created",
      Self::MarkChanged(_) => "mark_changed",
      Self::MarkDeleted(_) => "mark_deleted",
      Self::TimetableChanged { .. } => "timetable_changed",
      Self::PresenceChanged { .. } => "presence_changed",
      Self::SessionCreated { .. } => "session_created",
      Self::SessionClosed { .. } => "session_closed",
      Self::PhotoUpdated { .. } => "photo_updated",
      Self::MessageReceived { .. } => "message_received",
    }
  }
}

/// Explicit subscriber list for one component's re-raised events
pub struct Notifier<E> {
  tx: broadcast::Sender<E>,
}

impl<E: Clone + std::fmt::Debug> Notifier<E> {
  pub fn new(capacity: usize) -> Self {
    let (tx, _rx) = broadcast::channel(capacity.max(1));
    Self { tx }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<E> {
    self.tx.subscribe()
  }

  /// Deliver to current subscribers. Returns how many received it.
  pub fn emit(&self, event: E) -> usize {
    trace!(?event, "emit");
    // No subscribers is not an error
    self.tx.send(event).unwrap_or(0)
  }

  pub fn subscriber_count(&self) -> usize {
    self.tx.receiver_count()
  }
}

impl<E: Clone + std::fmt::Debug> Default for Notifier<E> {
  fn default() -> Self {
    Self::new(64)
  }
}
