//! Boundary with the remote data source.
//!
//! The remote is an opaque collaborator offering three call shapes: a paged
//! list fetch, a single-entity fetch and a scalar fetch. Everything above this
//! module talks to it through [`SyncContext`], which maps DTOs into entities
//! and races every call against the context's cancellation token.

mod http;
#[cfg(test)]
pub(crate) mod mock;
mod offline;

pub use http::HttpRemote;
pub use offline::OfflineRemote;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::cache::ScopeKey;
use crate::error::{Error, Result};

pub const DEFAULT_PAGE_SIZE: usize = 20;

/// Remote API methods the cache calls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
  Subjects,
  /// Tasks across every subject
  Tasks,
  /// Tasks of the subject named in the scope
  SubjectTasks,
  Task,
  Marks,
  Mark,
  GradeSummary,
  Timetable,
  Chats,
  Chat,
  Messages,
  Message,
  People,
  Person,
}

impl Method {
  pub fn path(&self) -> &'static str {
    match self {
      Self::Subjects => "subjects",
      Self::Tasks => "tasks",
      Self::SubjectTasks => "subject-tasks",
      Self::Task => "task",
      Self::Marks => "marks",
      Self::Mark => "mark",
      Self::GradeSummary => "grade-summary",
      Self::Timetable => "timetable",
      Self::Chats => "chats",
      Self::Chat => "chat",
      Self::Messages => "messages",
      Self::Message => "message",
      Self::People => "people",
      Self::Person => "person",
    }
  }
}

impl std::fmt::Display for Method {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.path())
  }
}

/// The remote data source. Shared read-only by every collection.
#[async_trait]
pub trait Remote: Send + Sync {
  /// Fetch `count` items starting at `offset` under `scope`.
  async fn fetch_page(
    &self,
    method: Method,
    scope: &ScopeKey,
    offset: usize,
    count: usize,
  ) -> Result<Vec<Value>>;

  /// Fetch one entity by id. `None` when the remote has no such entity.
  async fn fetch_one(&self, method: Method, id: i64) -> Result<Option<Value>>;

  /// Fetch a scalar aggregate for `scope`.
  async fn fetch_scalar(&self, method: Method, scope: &ScopeKey) -> Result<Option<Value>>;
}

#[async_trait]
impl<R: Remote + ?Sized> Remote for Arc<R> {
  async fn fetch_page(
    &self,
    method: Method,
    scope: &ScopeKey,
    offset: usize,
    count: usize,
  ) -> Result<Vec<Value>> {
    (**self).fetch_page(method, scope, offset, count).await
  }

  async fn fetch_one(&self, method: Method, id: i64) -> Result<Option<Value>> {
    (**self).fetch_one(method, id).await
  }

  async fn fetch_scalar(&self, method: Method, scope: &ScopeKey) -> Result<Option<Value>> {
    (**self).fetch_scalar(method, scope).await
  }
}

/// Shared remote handle plus the cancellation signal and page size every
/// collection fetches with.
#[derive(Clone)]
pub struct SyncContext {
  remote: Arc<dyn Remote>,
  cancel: CancellationToken,
  page_size: usize,
}

impl SyncContext {
  pub fn new(remote: Arc<dyn Remote>) -> Self {
    Self {
      remote,
      cancel: CancellationToken::new(),
      page_size: DEFAULT_PAGE_SIZE,
    }
  }

  pub fn with_page_size(mut self, page_size: usize) -> Self {
    self.page_size = page_size.max(1);
    self
  }

  pub fn page_size(&self) -> usize {
    self.page_size
  }

  /// A context whose token is cancelled along with this one but can also be
  /// cancelled on its own, e.g. when a single view closes.
  pub fn child(&self) -> Self {
    Self {
      remote: Arc::clone(&self.remote),
      cancel: self.cancel.child_token(),
      page_size: self.page_size,
    }
  }

  /// Abort every in-flight and future fetch made through this context.
  pub fn cancel(&self) {
    self.cancel.cancel();
  }

  pub fn is_cancelled(&self) -> bool {
    self.cancel.is_cancelled()
  }

  async fn guarded<T>(&self, fetch: impl Future<Output = Result<T>>) -> Result<T> {
    tokio::select! {
      biased;
      _ = self.cancel.cancelled() => Err(Error::Cancelled),
      result = fetch => result,
    }
  }

  /// Fetch one page and map each DTO into `T`.
  pub async fn page<T: DeserializeOwned>(
    &self,
    method: Method,
    scope: &ScopeKey,
    offset: usize,
    count: usize,
  ) -> Result<Vec<T>> {
    let values = self
      .guarded(self.remote.fetch_page(method, scope, offset, count))
      .await?;
    values.into_iter().map(|v| decode(method, v)).collect()
  }

  /// Fetch every page of a list.
  pub async fn all<T: DeserializeOwned>(&self, method: Method, scope: &ScopeKey) -> Result<Vec<T>> {
    let mut all = Vec::new();
    let mut offset = 0;

    loop {
      let page: Vec<T> = self.page(method, scope, offset, self.page_size).await?;
      let fetched = page.len();
      all.extend(page);

      if fetched < self.page_size {
        break;
      }
      offset += fetched;
    }

    Ok(all)
  }

  /// Fetch a single mandatory entity.
  pub async fn one<T: DeserializeOwned>(&self, method: Method, id: i64) -> Result<T> {
    match self.guarded(self.remote.fetch_one(method, id)).await? {
      Some(value) => decode(method, value),
      None => Err(Error::InvalidOperation(format!(
        "{} returned nothing for id {}",
        method, id
      ))),
    }
  }

  /// Fetch a mandatory scalar aggregate.
  pub async fn scalar<T: DeserializeOwned>(&self, method: Method, scope: &ScopeKey) -> Result<T> {
    match self.guarded(self.remote.fetch_scalar(method, scope)).await? {
      Some(value) => decode(method, value),
      None => Err(Error::InvalidOperation(format!(
        "{} returned nothing for {:?}",
        method, scope
      ))),
    }
  }
}

/// Encode a scope as a URL query string, e.g. `filter=Ivan&class_id=3`.
pub fn encode_scope(scope: &ScopeKey) -> String {
  url::form_urlencoded::Serializer::new(String::new())
    .extend_pairs(scope.query_pairs())
    .finish()
}

/// Map a DTO into its entity type.
fn decode<T: DeserializeOwned>(method: Method, value: Value) -> Result<T> {
  serde_json::from_value(value)
    .map_err(|e| Error::InvalidOperation(format!("malformed {} response: {}", method, e)))
}
