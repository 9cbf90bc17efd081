//! Core traits and types for the caching system.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::Result;
use crate::event::PushEvent;
use crate::school::types::TaskStatus;

/// Trait for entities that can live in a collection.
///
/// Equality and lookup inside a collection are defined solely on `id()`.
pub trait Identified: Clone + Send + Sync + DeserializeOwned + 'static {
  /// Stable identifier, unique within one collection instance
  fn id(&self) -> i64;

  /// Entity type name used in errors and logs (e.g. "mark", "task")
  fn kind() -> &'static str;
}

/// Offset cursor governing incremental pagination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor {
  /// Count of items already materialized from the remote
  pub offset: usize,
  pub page_size: usize,
  /// Set once the remote reports nothing past the last page, or a page
  /// makes no progress
  pub exhausted: bool,
}

impl Cursor {
  pub fn new(page_size: usize) -> Self {
    Self {
      offset: 0,
      page_size: page_size.max(1),
      exhausted: false,
    }
  }

  /// Record a page of `fetched` items; `more` is whether anything follows it.
  pub fn advance(&mut self, fetched: usize, more: bool) {
    self.offset += fetched;
    if fetched == 0 || !more {
      self.exhausted = true;
    }
  }

  /// Restart pagination at `offset`.
  pub fn reset(&mut self, offset: usize) {
    self.offset = offset;
    self.exhausted = false;
  }
}

/// How fetched pages are spliced into the backing list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Order {
  /// Pages arrive in display order and are appended.
  #[default]
  Oldest,
  /// Pages arrive newest first; each is reversed and inserted at the head so
  /// the list reads oldest to newest.
  NewestFirst,
}

/// The query dimensions selecting which slice of a dataset a collection holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize)]
pub struct ScopeKey {
  pub filter: Option<String>,
  pub status: Option<TaskStatus>,
  pub subject_id: Option<i64>,
  pub class_id: Option<i64>,
  /// Whose records are being viewed
  pub student_id: Option<i64>,
  pub chat_id: Option<i64>,
  /// Inclusive date range
  pub window: Option<(NaiveDate, NaiveDate)>,
}

impl ScopeKey {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn with_filter(mut self, filter: impl Into<String>) -> Self {
    self.filter = Some(filter.into());
    self
  }

  pub fn with_status(mut self, status: TaskStatus) -> Self {
    self.status = Some(status);
    self
  }

  pub fn with_subject(mut self, subject_id: i64) -> Self {
    self.subject_id = Some(subject_id);
    self
  }

  pub fn with_class(mut self, class_id: i64) -> Self {
    self.class_id = Some(class_id);
    self
  }

  pub fn with_student(mut self, student_id: i64) -> Self {
    self.student_id = Some(student_id);
    self
  }

  pub fn with_chat(mut self, chat_id: i64) -> Self {
    self.chat_id = Some(chat_id);
    self
  }

  pub fn with_window(mut self, from: NaiveDate, to: NaiveDate) -> Self {
    self.window = Some((from, to));
    self
  }

  /// Flatten into query parameters, skipping unset dimensions.
  pub fn query_pairs(&self) -> Vec<(&'static str, String)> {
    let mut pairs = Vec::new();
    if let Some(filter) = &self.filter {
      pairs.push(("filter", filter.clone()));
    }
    if let Some(status) = self.status {
      pairs.push(("status", status.as_str().to_string()));
    }
    if let Some(id) = self.subject_id {
      pairs.push(("subject_id", id.to_string()));
    }
    if let Some(id) = self.class_id {
      pairs.push(("class_id", id.to_string()));
    }
    if let Some(id) = self.student_id {
      pairs.push(("student_id", id.to_string()));
    }
    if let Some(id) = self.chat_id {
      pairs.push(("chat_id", id.to_string()));
    }
    if let Some((from, to)) = self.window {
      pairs.push(("from", from.to_string()));
      pairs.push(("to", to.to_string()));
    }
    pairs
  }
}

/// What a parent collection may do with a nested cache.
///
/// The hierarchy only ever crosses this boundary; parents never reach into a
/// child's backing list.
#[async_trait]
pub trait EventSink: Send + Sync {
  /// Whether the child has been forced at least once
  fn is_materialized(&self) -> bool;

  /// Apply an event in place. Events the sink does not handle are ignored.
  async fn apply_event(&self, event: &PushEvent) -> Result<()>;
}
