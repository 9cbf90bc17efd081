//! Offline mode for any remote.
//!
//! Every successful response is recorded in a mirror. When the wrapped
//! remote is unavailable, the last recorded response for the same request is
//! served instead, as long as it is not older than the configured maximum
//! age. Other errors are never masked.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, warn};

use super::{encode_scope, Method, Remote};
use crate::cache::storage::{MirrorStorage, SqliteStorage};
use crate::cache::ScopeKey;
use crate::error::{Error, Result};

pub struct OfflineRemote<R, S = SqliteStorage> {
  inner: R,
  storage: Arc<S>,
  /// Recorded responses older than this are not served
  max_age: Option<Duration>,
}

impl<R: Remote, S: MirrorStorage> OfflineRemote<R, S> {
  pub fn new(inner: R, storage: S) -> Self {
    Self {
      inner,
      storage: Arc::new(storage),
      max_age: None,
    }
  }

  pub fn with_max_age(mut self, max_age: Duration) -> Self {
    self.max_age = Some(max_age);
    self
  }

  fn is_too_old(&self, cached_at: chrono::DateTime<Utc>) -> bool {
    self
      .max_age
      .is_some_and(|max_age| Utc::now() - cached_at > max_age)
  }

  /// Run `fetch`, recording its response, or fall back to the mirror when
  /// the remote is unavailable.
  async fn mirrored<F>(&self, request: String, fetch: F) -> Result<Value>
  where
    F: Future<Output = Result<Value>>,
  {
    let key = request_key(&request);

    match fetch.await {
      Ok(body) => {
        // A failing mirror must not fail a successful fetch
        if let Err(e) = self.storage.store(&key, &request, &body, Utc::now()) {
          warn!(%request, error = %e, "failed to record response");
        }
        Ok(body)
      }
      Err(e @ Error::RemoteUnavailable(_)) => match self.storage.get(&key)? {
        Some(mirrored) if !self.is_too_old(mirrored.cached_at) => {
          warn!(
            %request,
            cached_at = %mirrored.cached_at,
            error = %e,
            "remote unavailable, serving recorded response"
          );
          Ok(mirrored.body)
        }
        Some(_) => {
          debug!(%request, "recorded response too old to serve");
          Err(e)
        }
        None => Err(e),
      },
      Err(e) => Err(e),
    }
  }
}

#[async_trait]
impl<R: Remote, S: MirrorStorage> Remote for OfflineRemote<R, S> {
  async fn fetch_page(
    &self,
    method: Method,
    scope: &ScopeKey,
    offset: usize,
    count: usize,
  ) -> Result<Vec<Value>> {
    let request = format!(
      "{}?offset={}&count={}&{}",
      method,
      offset,
      count,
      encode_scope(scope)
    );
    let body = self
      .mirrored(request, async {
        self
          .inner
          .fetch_page(method, scope, offset, count)
          .await
          .map(Value::Array)
      })
      .await?;

    match body {
      Value::Array(items) => Ok(items),
      other => Err(Error::InvalidOperation(format!(
        "recorded {} response is not a list: {}",
        method, other
      ))),
    }
  }

  async fn fetch_one(&self, method: Method, id: i64) -> Result<Option<Value>> {
    let request = format!("{}/{}", method, id);
    let body = self
      .mirrored(request, async {
        Ok(self.inner.fetch_one(method, id).await?.unwrap_or(Value::Null))
      })
      .await?;
    Ok((!body.is_null()).then_some(body))
  }

  async fn fetch_scalar(&self, method: Method, scope: &ScopeKey) -> Result<Option<Value>> {
    let request = format!("{}?{}", method, encode_scope(scope));
    let body = self
      .mirrored(request, async {
        Ok(
          self
            .inner
            .fetch_scalar(method, scope)
            .await?
            .unwrap_or(Value::Null),
        )
      })
      .await?;
    Ok((!body.is_null()).then_some(body))
  }
}

/// Stable, fixed-length key for a request description.
fn request_key(request: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(request.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::mock::MockRemote;
  use serde_json::json;

  fn mirrored_people() -> (Arc<MockRemote>, OfflineRemote<Arc<MockRemote>>) {
    let mock = MockRemote::new();
    mock.seed(
      Method::People,
      vec![json!({ "id": 1, "display_name": "Ivan Petrov" })],
    );
    let storage = SqliteStorage::open_in_memory().unwrap();
    (mock.clone(), OfflineRemote::new(mock, storage))
  }

  #[tokio::test]
  async fn test_serves_recorded_page_when_unavailable() {
    let (mock, remote) = mirrored_people();
    let scope = ScopeKey::new().with_filter("Ivan");

    let online = remote.fetch_page(Method::People, &scope, 0, 20).await.unwrap();
    mock.fail_next(Method::People, 1);
    let offline = remote.fetch_page(Method::People, &scope, 0, 20).await.unwrap();

    assert_eq!(online, offline);
    assert_eq!(mock.calls(Method::People), 2);
  }

  #[tokio::test]
  async fn test_unrecorded_request_still_fails() {
    let (mock, remote) = mirrored_people();
    remote
      .fetch_page(Method::People, &ScopeKey::new(), 0, 20)
      .await
      .unwrap();

    mock.fail_next(Method::People, 1);
    let other_page = remote.fetch_page(Method::People, &ScopeKey::new(), 20, 20).await;
    assert!(matches!(other_page, Err(Error::RemoteUnavailable(_))));
  }

  #[tokio::test]
  async fn test_missing_entity_recorded_as_none() {
    let (mock, remote) = mirrored_people();
    assert!(remote.fetch_one(Method::Person, 9).await.unwrap().is_none());

    mock.fail_next(Method::Person, 1);
    assert!(remote.fetch_one(Method::Person, 9).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_old_recording_not_served() {
    let mock = MockRemote::new();
    let storage = SqliteStorage::open_in_memory().unwrap();
    storage
      .store(
        &request_key("grade-summary?subject_id=3"),
        "grade-summary?subject_id=3",
        &json!({ "average": "4.00" }),
        Utc::now() - Duration::hours(5),
      )
      .unwrap();
    let remote = OfflineRemote::new(mock.clone(), storage).with_max_age(Duration::hours(1));

    mock.fail_next(Method::GradeSummary, 1);
    let result = remote
      .fetch_scalar(Method::GradeSummary, &ScopeKey::new().with_subject(3))
      .await;
    assert!(matches!(result, Err(Error::RemoteUnavailable(_))));
  }

  #[test]
  fn test_request_key_is_stable_hex() {
    let key = request_key("subjects?offset=0&count=20&");
    assert_eq!(key.len(), 64);
    assert_eq!(key, request_key("subjects?offset=0&count=20&"));
    assert_ne!(key, request_key("subjects?offset=20&count=20&"));
  }
}
