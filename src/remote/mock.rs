//! In-memory remote for tests.

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use super::{Method, Remote};
use crate::cache::ScopeKey;
use crate::error::{Error, Result};
use crate::school::Task;

/// A recorded page request
#[derive(Debug, Clone)]
pub struct PageRequest {
  pub method: Method,
  pub scope: ScopeKey,
  pub offset: usize,
  pub count: usize,
}

#[derive(Default)]
struct State {
  tables: HashMap<&'static str, Vec<Value>>,
  scalars: HashMap<(Method, i64), Value>,
  calls: HashMap<Method, usize>,
  failures: HashMap<Method, usize>,
  requests: Vec<PageRequest>,
  latency: Duration,
}

/// Fake school server backed by JSON rows.
///
/// List and single-entity methods over the same entity share one table, so
/// `seed(Method::Marks, ..)` also answers `fetch_one(Method::Mark, id)`.
#[derive(Default)]
pub struct MockRemote {
  state: Mutex<State>,
}

fn table(method: Method) -> &'static str {
  match method {
    Method::Subjects => "subjects",
    Method::Tasks | Method::SubjectTasks | Method::Task => "tasks",
    Method::Marks | Method::Mark => "marks",
    Method::GradeSummary => "grade_summary",
    Method::Timetable => "lessons",
    Method::Chats | Method::Chat => "chats",
    Method::Messages | Method::Message => "messages",
    Method::People | Method::Person => "people",
  }
}

fn row_id(row: &Value) -> Option<i64> {
  row.get("id").and_then(Value::as_i64)
}

fn row_i64(row: &Value, field: &str) -> Option<i64> {
  row.get(field).and_then(Value::as_i64)
}

fn display_name(row: &Value) -> &str {
  ["display_name", "title", "name"]
    .iter()
    .find_map(|f| row.get(*f).and_then(Value::as_str))
    .unwrap_or("")
}

impl MockRemote {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn seed(&self, method: Method, rows: impl IntoIterator<Item = Value>) {
    let mut state = self.state.lock().unwrap();
    state
      .tables
      .entry(table(method))
      .or_default()
      .extend(rows);
  }

  /// Insert or replace a row by id
  pub fn put(&self, method: Method, row: Value) {
    let mut state = self.state.lock().unwrap();
    let rows = state.tables.entry(table(method)).or_default();
    let id = row_id(&row);
    match rows.iter_mut().find(|r| row_id(r) == id) {
      Some(existing) => *existing = row,
      None => rows.push(row),
    }
  }

  pub fn delete(&self, method: Method, id: i64) {
    let mut state = self.state.lock().unwrap();
    if let Some(rows) = state.tables.get_mut(table(method)) {
      rows.retain(|r| row_id(r) != Some(id));
    }
  }

  /// Scalar answer for `method` when the scope's subject is `subject_id`
  /// (0 for unscoped).
  pub fn set_scalar(&self, method: Method, subject_id: i64, value: Value) {
    let mut state = self.state.lock().unwrap();
    state.scalars.insert((method, subject_id), value);
  }

  /// Make the next `times` calls to `method` fail as unavailable
  pub fn fail_next(&self, method: Method, times: usize) {
    let mut state = self.state.lock().unwrap();
    state.failures.insert(method, times);
  }

  pub fn set_latency(&self, latency: Duration) {
    self.state.lock().unwrap().latency = latency;
  }

  pub fn calls(&self, method: Method) -> usize {
    let state = self.state.lock().unwrap();
    state.calls.get(&method).copied().unwrap_or(0)
  }

  pub fn requests(&self, method: Method) -> Vec<PageRequest> {
    let state = self.state.lock().unwrap();
    state
      .requests
      .iter()
      .filter(|r| r.method == method)
      .cloned()
      .collect()
  }

  /// Count the call and apply latency and failure injection
  async fn enter(&self, method: Method) -> Result<()> {
    let latency = {
      let mut state = self.state.lock().unwrap();
      *state.calls.entry(method).or_default() += 1;
      state.latency
    };
    if !latency.is_zero() {
      tokio::time::sleep(latency).await;
    }

    let mut state = self.state.lock().unwrap();
    if let Some(remaining) = state.failures.get_mut(&method) {
      if *remaining > 0 {
        *remaining -= 1;
        return Err(Error::RemoteUnavailable(format!("{} failed", method)));
      }
    }
    Ok(())
  }

  fn matches(method: Method, scope: &ScopeKey, row: &Value) -> bool {
    if let Some(filter) = &scope.filter {
      if !display_name(row)
        .to_lowercase()
        .starts_with(&filter.to_lowercase())
      {
        return false;
      }
    }

    let subject_scoped = matches!(method, Method::SubjectTasks | Method::Marks);
    if let Some(subject_id) = scope.subject_id.filter(|id| subject_scoped && *id != 0) {
      if row_i64(row, "subject_id") != Some(subject_id) {
        return false;
      }
    }

    if let Some(class_id) = scope.class_id {
      if row.get("class_id").is_some() && row_i64(row, "class_id") != Some(class_id) {
        return false;
      }
    }

    if let Some(chat_id) = scope.chat_id {
      if row_i64(row, "chat_id") != Some(chat_id) {
        return false;
      }
    }

    if let Some(status) = scope.status {
      match serde_json::from_value::<Task>(row.clone()) {
        Ok(task) if task.status(Utc::now()) == status => {}
        _ => return false,
      }
    }

    if let Some((from, to)) = scope.window {
      let date = row
        .get("date")
        .and_then(Value::as_str)
        .and_then(|d| d.parse::<NaiveDate>().ok());
      match date {
        Some(d) if d >= from && d <= to => {}
        _ => return false,
      }
    }

    true
  }
}

#[async_trait]
impl Remote for MockRemote {
  async fn fetch_page(
    &self,
    method: Method,
    scope: &ScopeKey,
    offset: usize,
    count: usize,
  ) -> Result<Vec<Value>> {
    self.enter(method).await?;

    let mut state = self.state.lock().unwrap();
    state.requests.push(PageRequest {
      method,
      scope: scope.clone(),
      offset,
      count,
    });

    let mut rows: Vec<Value> = state
      .tables
      .get(table(method))
      .map(|rows| {
        rows
          .iter()
          .filter(|r| Self::matches(method, scope, r))
          .cloned()
          .collect()
      })
      .unwrap_or_default();

    // Chat history is served newest first
    if method == Method::Messages {
      rows.sort_by_key(|r| std::cmp::Reverse(row_id(r)));
    }

    Ok(rows.into_iter().skip(offset).take(count).collect())
  }

  async fn fetch_one(&self, method: Method, id: i64) -> Result<Option<Value>> {
    self.enter(method).await?;

    let state = self.state.lock().unwrap();
    Ok(
      state
        .tables
        .get(table(method))
        .and_then(|rows| rows.iter().find(|r| row_id(r) == Some(id)))
        .cloned(),
    )
  }

  async fn fetch_scalar(&self, method: Method, scope: &ScopeKey) -> Result<Option<Value>> {
    self.enter(method).await?;

    let state = self.state.lock().unwrap();
    let key = (method, scope.subject_id.unwrap_or(0));
    Ok(state.scalars.get(&key).cloned())
  }
}
