//! Per-subject grade aggregate.
//!
//! Holds the server-computed average (and final mark) for one subject and
//! student, plus a lazily loaded list of the individual marks. The average is
//! never derived from the cached marks: after every mark mutation the scalar
//! is fetched again, since rounding and which marks count are decided
//! server-side.

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::deferred::Deferred;
use super::traits::{EventSink, ScopeKey};
use crate::error::{Error, Result};
use crate::event::{MarkEvent, Notifier, PushEvent};
use crate::remote::{Method, SyncContext};
use crate::school::{GradeSummary, Mark, ALL_SUBJECTS};

/// Which marks an aggregate summarizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GradeScope {
  pub subject_id: i64,
  pub student_id: i64,
}

impl GradeScope {
  pub fn new(subject_id: i64, student_id: i64) -> Self {
    Self {
      subject_id,
      student_id,
    }
  }

  /// Subject 0 covers every subject of the same student.
  pub fn covers(&self, event: &MarkEvent) -> bool {
    self.student_id == event.student_id
      && (self.subject_id == ALL_SUBJECTS || self.subject_id == event.subject_id)
  }

  pub fn key(&self) -> ScopeKey {
    ScopeKey::new()
      .with_subject(self.subject_id)
      .with_student(self.student_id)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkChange {
  Created,
  Changed,
  Deleted,
}

/// Raised to subscribers after an aggregate applied a mark event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GradeUpdate {
  pub scope: GradeScope,
  pub mark_id: i64,
  pub change: MarkChange,
  /// Fresh summary, when the summary is materialized
  pub summary: Option<GradeSummary>,
}

pub struct GradeAggregate {
  scope: GradeScope,
  ctx: SyncContext,
  summary: Deferred<Mutex<GradeSummary>>,
  marks: Deferred<Mutex<Vec<Mark>>>,
  events: Mutex<()>,
  notifier: Notifier<GradeUpdate>,
}

impl GradeAggregate {
  pub fn new(ctx: SyncContext, scope: GradeScope) -> Self {
    let summary_ctx = ctx.clone();
    let summary = Deferred::new(move || {
      let ctx = summary_ctx.clone();
      async move {
        let summary: GradeSummary = ctx.scalar(Method::GradeSummary, &scope.key()).await?;
        Ok(Mutex::new(summary))
      }
    });

    let marks_ctx = ctx.clone();
    let marks = Deferred::new(move || {
      let ctx = marks_ctx.clone();
      async move {
        let marks: Vec<Mark> = ctx.all(Method::Marks, &scope.key()).await?;
        debug!(?scope, count = marks.len(), "hydrated marks");
        Ok(Mutex::new(marks))
      }
    });

    Self {
      scope,
      ctx,
      summary,
      marks,
      events: Mutex::new(()),
      notifier: Notifier::default(),
    }
  }

  pub fn scope(&self) -> GradeScope {
    self.scope
  }

  pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<GradeUpdate> {
    self.notifier.subscribe()
  }

  pub async fn summary(&self) -> Result<GradeSummary> {
    Ok(self.summary.force().await?.lock().await.clone())
  }

  pub async fn average(&self) -> Result<String> {
    Ok(self.summary().await?.average)
  }

  pub async fn final_mark(&self) -> Result<Option<String>> {
    Ok(self.summary().await?.final_mark)
  }

  pub async fn get_marks(&self) -> Result<Vec<Mark>> {
    Ok(self.marks.force().await?.lock().await.clone())
  }

  pub fn is_summary_materialized(&self) -> bool {
    self.summary.is_forced()
  }

  pub fn are_marks_materialized(&self) -> bool {
    self.marks.is_forced()
  }

  /// Fetch the fresh summary if anyone has looked at it.
  async fn refetch_summary(&self) -> Result<Option<GradeSummary>> {
    if !self.summary.is_forced() {
      return Ok(None);
    }
    let summary = self
      .ctx
      .scalar(Method::GradeSummary, &self.scope.key())
      .await?;
    Ok(Some(summary))
  }

  /// Fetch the mark if the mark list is materialized.
  async fn refetch_mark(&self, mark_id: i64) -> Result<Option<Mark>> {
    if !self.marks.is_forced() {
      return Ok(None);
    }
    Ok(Some(self.ctx.one(Method::Mark, mark_id).await?))
  }

  async fn commit_summary(&self, summary: Option<GradeSummary>) {
    if let (Some(summary), Some(cell)) = (summary, self.summary.get()) {
      *cell.lock().await = summary;
    }
  }

  fn notify(&self, event: &MarkEvent, change: MarkChange, summary: Option<GradeSummary>) {
    self.notifier.emit(GradeUpdate {
      scope: self.scope,
      mark_id: event.mark_id,
      change,
      summary,
    });
  }

  fn should_apply(&self, event: &MarkEvent) -> bool {
    self.scope.covers(event) && EventSink::is_materialized(self)
  }

  pub async fn on_mark_created(&self, event: &MarkEvent) -> Result<()> {
    if !self.should_apply(event) {
      return Ok(());
    }
    let _guard = self.events.lock().await;

    let mark = self.refetch_mark(event.mark_id).await?;
    let summary = self.refetch_summary().await?;

    if let (Some(mark), Some(cell)) = (mark, self.marks.get()) {
      let mut marks = cell.lock().await;
      match marks.iter().position(|m| m.id == mark.id) {
        Some(pos) => marks[pos] = mark,
        None => marks.push(mark),
      }
    }
    self.commit_summary(summary.clone()).await;

    debug!(scope = ?self.scope, mark_id = event.mark_id, "mark created");
    self.notify(event, MarkChange::Created, summary);
    Ok(())
  }

  /// Overwrite a cached mark in place. A materialized list missing the mark
  /// means the event was misrouted, which is reported as `NotFound`.
  pub async fn on_mark_changed(&self, event: &MarkEvent) -> Result<()> {
    if !self.should_apply(event) {
      return Ok(());
    }
    let _guard = self.events.lock().await;

    if let Some(cell) = self.marks.get() {
      if !cell.lock().await.iter().any(|m| m.id == event.mark_id) {
        return Err(Error::not_found("mark", event.mark_id));
      }
    }

    let mark = self.refetch_mark(event.mark_id).await?;
    let summary = self.refetch_summary().await?;

    if let (Some(mark), Some(cell)) = (mark, self.marks.get()) {
      let mut marks = cell.lock().await;
      let pos = marks
        .iter()
        .position(|m| m.id == event.mark_id)
        .ok_or_else(|| Error::not_found("mark", event.mark_id))?;
      marks[pos] = mark;
    }
    self.commit_summary(summary.clone()).await;

    debug!(scope = ?self.scope, mark_id = event.mark_id, "mark changed");
    self.notify(event, MarkChange::Changed, summary);
    Ok(())
  }

  pub async fn on_mark_deleted(&self, event: &MarkEvent) -> Result<()> {
    if !self.should_apply(event) {
      return Ok(());
    }
    let _guard = self.events.lock().await;

    let summary = self.refetch_summary().await?;

    if let Some(cell) = self.marks.get() {
      cell.lock().await.retain(|m| m.id != event.mark_id);
    }
    self.commit_summary(summary.clone()).await;

    debug!(scope = ?self.scope, mark_id = event.mark_id, "mark deleted");
    self.notify(event, MarkChange::Deleted, summary);
    Ok(())
  }
}

#[async_trait]
impl EventSink for GradeAggregate {
  fn is_materialized(&self) -> bool {
    self.summary.is_forced() || self.marks.is_forced()
  }

  async fn apply_event(&self, event: &PushEvent) -> Result<()> {
    match event {
      PushEvent::MarkCreated(e) => self.on_mark_created(e).await,
      PushEvent::MarkChanged(e) => self.on_mark_changed(e).await,
      PushEvent::MarkDeleted(e) => self.on_mark_deleted(e).await,
      _ => Ok(()),
    }
  }
}
