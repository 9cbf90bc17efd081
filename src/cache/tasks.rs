//! Task collection scoped by subject and completion status.

use async_trait::async_trait;
use chrono::Utc;
use std::ops::Deref;
use tokio::sync::Mutex;
use tracing::debug;

use super::paged::{ListRoute, PagedCollection, Route};
use super::scoped::ScopedCollection;
use super::traits::{EventSink, ScopeKey};
use crate::error::Result;
use crate::event::PushEvent;
use crate::remote::{Method, SyncContext};
use crate::school::{Task, TaskStatus, ALL_SUBJECTS};

/// "All subjects" and single-subject listings are different remote queries.
pub const TASKS: Route = Route {
  list: ListRoute::PerSubject {
    all: Method::Tasks,
    subject: Method::SubjectTasks,
  },
  single: Method::Task,
};

pub struct TaskCollection {
  ctx: SyncContext,
  inner: ScopedCollection<Task>,
  /// Serializes event application, which spans several list operations
  events: Mutex<()>,
}

impl TaskCollection {
  pub fn new(ctx: SyncContext, scope: ScopeKey) -> Self {
    Self {
      inner: ScopedCollection::from_paged(PagedCollection::new(ctx.clone(), TASKS, scope)),
      ctx,
      events: Mutex::new(()),
    }
  }

  pub fn for_subject(ctx: SyncContext, subject_id: i64, student_id: Option<i64>) -> Self {
    let scope = ScopeKey {
      subject_id: Some(subject_id),
      student_id,
      ..ScopeKey::default()
    };
    Self::new(ctx, scope)
  }

  pub fn subject_id(&self) -> i64 {
    self.inner.scope().subject_id.unwrap_or(ALL_SUBJECTS)
  }

  pub fn is_all_subjects(&self) -> bool {
    self.subject_id() == ALL_SUBJECTS
  }

  fn covers(&self, subject_id: i64) -> bool {
    self.is_all_subjects() || self.subject_id() == subject_id
  }

  /// A task was published. The all-subjects view treats this as a completion
  /// signal, matching how the creator-side notification has always been
  /// handled there.
  pub async fn on_created_task(&self, task_id: i64, subject_id: i64) -> Result<()> {
    if !self.is_materialized() || !self.covers(subject_id) {
      return Ok(());
    }
    let _guard = self.events.lock().await;

    if self.is_all_subjects() {
      return self.apply_completion(task_id, true).await;
    }
    self.apply_completion(task_id, false).await
  }

  pub async fn on_completed_task(
    &self,
    task_id: i64,
    subject_id: i64,
    completed: bool,
  ) -> Result<()> {
    if !self.is_materialized() || !self.covers(subject_id) {
      return Ok(());
    }
    let _guard = self.events.lock().await;
    self.apply_completion(task_id, completed).await
  }

  /// Move the task into or out of this view according to the status the
  /// event implies.
  async fn apply_completion(&self, task_id: i64, completed: bool) -> Result<()> {
    let wanted = self.inner.scope().status;

    if completed {
      return if wanted.map_or(true, |s| s == TaskStatus::Completed) {
        let task = self.ctx.one::<Task>(TASKS.single, task_id).await?;
        self.upsert(task).await
      } else {
        self.drop_task(task_id).await
      };
    }

    if wanted == Some(TaskStatus::Completed) {
      return self.drop_task(task_id).await;
    }

    let task = self.ctx.one::<Task>(TASKS.single, task_id).await?;
    let status = match task.status(Utc::now()) {
      // The event is authoritative: the task is open again
      TaskStatus::Completed => TaskStatus::Pending,
      other => other,
    };
    if wanted.map_or(true, |s| s == status) {
      self.upsert(task).await
    } else {
      self.drop_task(task_id).await
    }
  }

  /// Replace in place when present, otherwise show it first.
  async fn upsert(&self, task: Task) -> Result<()> {
    let id = task.id;
    if !self.inner.replace(task.clone()).await? {
      self.inner.insert_item(0, task).await?;
      debug!(task_id = id, subject_id = self.subject_id(), "task added to view");
    }
    Ok(())
  }

  async fn drop_task(&self, task_id: i64) -> Result<()> {
    if self.inner.remove(task_id).await?.is_some() {
      debug!(task_id, subject_id = self.subject_id(), "task left view");
    }
    Ok(())
  }
}

impl Deref for TaskCollection {
  type Target = ScopedCollection<Task>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

#[async_trait]
impl EventSink for TaskCollection {
  fn is_materialized(&self) -> bool {
    self.inner.is_materialized()
  }

  async fn apply_event(&self, event: &PushEvent) -> Result<()> {
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
      _ => Ok(()),
    }
  }
}
