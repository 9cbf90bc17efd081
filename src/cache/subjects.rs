//! Subject hierarchy and push-event fan-out.
//!
//! Every subject node lazily owns a grade aggregate and a task collection.
//! The collection is the single entry point for task, mark and timetable
//! events: it routes each one to the matching nodes' children that are
//! already materialized, then re-raises the event once for its own
//! subscribers. Caches nobody has opened are left alone; they will fetch
//! current data when first accessed.

use chrono::NaiveDate;
use std::sync::{Arc, OnceLock};
use tracing::{debug, warn};

use super::deferred::Deferred;
use super::grades::{GradeAggregate, GradeScope};
use super::tasks::TaskCollection;
use super::traits::{EventSink, ScopeKey};
use crate::error::{Error, Result};
use crate::event::{MarkEvent, Notifier, PushEvent};
use crate::remote::{Method, SyncContext};
use crate::school::{Subject, ALL_SUBJECTS};

pub struct SubjectNode {
  subject: Subject,
  ctx: SyncContext,
  student_id: i64,
  grades: OnceLock<Arc<GradeAggregate>>,
  tasks: OnceLock<Arc<TaskCollection>>,
}

impl SubjectNode {
  fn new(ctx: SyncContext, subject: Subject, student_id: i64) -> Self {
    Self {
      subject,
      ctx,
      student_id,
      grades: OnceLock::new(),
      tasks: OnceLock::new(),
    }
  }

  pub fn id(&self) -> i64 {
    self.subject.id
  }

  pub fn subject(&self) -> &Subject {
    &self.subject
  }

  pub fn is_all_subjects(&self) -> bool {
    self.subject.is_all()
  }

  /// The node's grade aggregate. Creating it does not fetch anything.
  pub fn grades(&self) -> Arc<GradeAggregate> {
    Arc::clone(self.grades.get_or_init(|| {
      Arc::new(GradeAggregate::new(
        self.ctx.clone(),
        GradeScope::new(self.subject.id, self.student_id),
      ))
    }))
  }

  /// The node's task collection. Creating it does not fetch anything.
  pub fn tasks(&self) -> Arc<TaskCollection> {
    Arc::clone(self.tasks.get_or_init(|| {
      Arc::new(TaskCollection::for_subject(
        self.ctx.clone(),
        self.subject.id,
        Some(self.student_id),
      ))
    }))
  }

  fn covers(&self, subject_id: Option<i64>) -> bool {
    match subject_id {
      Some(id) => self.is_all_subjects() || self.subject.id == id,
      None => true,
    }
  }

  /// Children that have been forced at least once.
  fn materialized_sinks(&self) -> Vec<Arc<dyn EventSink>> {
    let mut sinks: Vec<Arc<dyn EventSink>> = Vec::new();
    if let Some(grades) = self.grades.get() {
      if grades.is_materialized() {
        sinks.push(grades.clone());
      }
    }
    if let Some(tasks) = self.tasks.get() {
      if tasks.is_materialized() {
        sinks.push(tasks.clone());
      }
    }
    sinks
  }
}

impl std::fmt::Debug for SubjectNode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("SubjectNode")
      .field("subject", &self.subject)
      .field("grades", &self.grades.get().is_some())
      .field("tasks", &self.tasks.get().is_some())
      .finish()
  }
}

pub struct SubjectCollection {
  student_id: i64,
  nodes: Deferred<Vec<Arc<SubjectNode>>>,
  notifier: Notifier<PushEvent>,
}

impl SubjectCollection {
  pub fn new(ctx: SyncContext, student_id: i64) -> Self {
    let nodes = Deferred::new(move || {
      let ctx = ctx.clone();
      async move {
        let scope = ScopeKey::new().with_student(student_id);
        let subjects: Vec<Subject> = ctx.all(Method::Subjects, &scope).await?;
        debug!(student_id, count = subjects.len(), "hydrated subjects");

        let nodes: Vec<Arc<SubjectNode>> = std::iter::once(Subject::all())
          .chain(subjects.into_iter().filter(|s| !s.is_all()))
          .map(|s| Arc::new(SubjectNode::new(ctx.clone(), s, student_id)))
          .collect();
        Ok(nodes)
      }
    });

    Self {
      student_id,
      nodes,
      notifier: Notifier::default(),
    }
  }

  pub fn student_id(&self) -> i64 {
    self.student_id
  }

  pub fn is_materialized(&self) -> bool {
    self.nodes.is_forced()
  }

  /// Subscribe to events after they have been applied
  pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PushEvent> {
    self.notifier.subscribe()
  }

  pub async fn items(&self) -> Result<Vec<Arc<SubjectNode>>> {
    Ok(self.nodes.force().await?.clone())
  }

  pub async fn len(&self) -> Result<usize> {
    Ok(self.nodes.force().await?.len())
  }

  pub async fn get_by_id(&self, subject_id: i64) -> Result<Arc<SubjectNode>> {
    self
      .nodes
      .force()
      .await?
      .iter()
      .find(|n| n.id() == subject_id)
      .cloned()
      .ok_or_else(|| Error::not_found("subject", subject_id))
  }

  pub async fn all_subjects(&self) -> Result<Arc<SubjectNode>> {
    self.get_by_id(ALL_SUBJECTS).await
  }

  /// Apply `event` to every materialized child of the nodes it concerns,
  /// then re-raise it once. A failing child does not stop the others; the
  /// first error is returned after the re-raise.
  async fn fan_out(&self, event: &PushEvent) -> Result<()> {
    let subject_id = event.subject_id();
    let mut first_error = None;
    let mut reached = 0;

    if let Some(nodes) = self.nodes.get() {
      for node in nodes.iter().filter(|n| n.covers(subject_id)) {
        for sink in node.materialized_sinks() {
          reached += 1;
          if let Err(e) = sink.apply_event(event).await {
            warn!(
              event = event.kind(),
              subject_id = node.id(),
              error = %e,
              "child failed to apply event"
            );
            first_error.get_or_insert(e);
          }
        }
      }
    }

    debug!(event = event.kind(), ?subject_id, reached, "fanned out");
    self.notifier.emit(event.clone());

    match first_error {
      Some(e) => Err(e),
      None => Ok(()),
    }
  }

  pub async fn on_created_task(&self, task_id: i64, subject_id: i64) -> Result<()> {
    self
      .fan_out(&PushEvent::TaskCreated {
        task_id,
        subject_id,
      })
      .await
  }

  pub async fn on_completed_task(
    &self,
    task_id: i64,
    subject_id: i64,
    completed: bool,
  ) -> Result<()> {
    self
      .fan_out(&PushEvent::TaskCompleted {
        task_id,
        subject_id,
        completed,
      })
      .await
  }

  pub async fn on_created_assessment(&self, event: MarkEvent) -> Result<()> {
    self.fan_out(&PushEvent::MarkCreated(event)).await
  }

  pub async fn on_changed_assessment(&self, event: MarkEvent) -> Result<()> {
    self.fan_out(&PushEvent::MarkChanged(event)).await
  }

  pub async fn on_deleted_assessment(&self, event: MarkEvent) -> Result<()> {
    self.fan_out(&PushEvent::MarkDeleted(event)).await
  }

  /// No subject child caches lessons, so this only re-raises.
  pub async fn on_changed_timetable(&self, class_id: i64, date: NaiveDate) -> Result<()> {
    self
      .fan_out(&PushEvent::TimetableChanged { class_id, date })
      .await
  }

  /// Whether `event` is one this collection handles.
  pub fn handles(event: &PushEvent) -> bool {
    matches!(
      event,
      PushEvent::TaskCreated { .. }
        | PushEvent::TaskCompleted { .. }
        | PushEvent::MarkCreated(_)
        | PushEvent::MarkChanged(_)
        | PushEvent::MarkDeleted(_)
        | PushEvent::TimetableChanged { .. }
    )
  }

  pub async fn apply(&self, event: &PushEvent) -> Result<()> {
    match *event {
      PushEvent::TaskCreated {
        task_id,
        subject_id,
      } => self.on_created_task(task_id, subject_id).await,
      PushEvent::TaskCompleted {
        task_id,
        subject_id,
        completed,
      } => self.on_completed_task(task_id, subject_id, completed).await,
      PushEvent::MarkCreated(e) => self.on_created_assessment(e).await,
      PushEvent::MarkChanged(e) => self.on_changed_assessment(e).await,
      PushEvent::MarkDeleted(e) => self.on_deleted_assessment(e).await,
      PushEvent::TimetableChanged { class_id, date } => {
        self.on_changed_timetable(class_id, date).await
      }
      _ => Ok(()),
    }
  }
}
