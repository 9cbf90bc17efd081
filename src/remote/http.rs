//! JSON-over-HTTP remote.

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;
use tracing::trace;
use url::Url;

use super::{Method, Remote};
use crate::cache::ScopeKey;
use crate::error::{Error, Result};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// School API client
#[derive(Clone)]
pub struct HttpRemote {
  client: reqwest::Client,
  base: Url,
  token: Option<String>,
}

impl HttpRemote {
  pub fn new(base: &str, token: Option<String>) -> Result<Self> {
    let base = Url::parse(base)
      .map_err(|e| Error::InvalidOperation(format!("invalid server url {}: {}", base, e)))?;
    if base.cannot_be_a_base() {
      return Err(Error::InvalidOperation(format!(
        "{} cannot be used as a base url",
        base
      )));
    }

    let client = reqwest::Client::builder()
      .timeout(REQUEST_TIMEOUT)
      .gzip(true)
      .build()
      .map_err(|e| Error::InvalidOperation(format!("failed to create http client: {}", e)))?;

    Ok(Self {
      client,
      base,
      token,
    })
  }

  /// `{base}/{segments...}`
  fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  /// GET `url` and decode the JSON body. 404 and a null body are `None`.
  async fn get(&self, url: Url) -> Result<Option<Value>> {
    trace!(%url, "GET");
    let mut request = self.client.get(url.clone());
    if let Some(token) = &self.token {
      request = request.bearer_auth(token);
    }

    let response = request
      .send()
      .await
      .map_err(|e| Error::RemoteUnavailable(format!("GET {}: {}", url, e)))?;

    let status = response.status();
    if status == StatusCode::NOT_FOUND {
      return Ok(None);
    }
    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
      return Err(Error::RemoteUnavailable(format!("GET {} returned {}", url, status)));
    }
    if !status.is_success() {
      return Err(Error::InvalidOperation(format!("GET {} returned {}", url, status)));
    }

    let body: Value = response
      .json()
      .await
      .map_err(|e| Error::InvalidOperation(format!("GET {}: malformed body: {}", url, e)))?;
    Ok((!body.is_null()).then_some(body))
  }
}

#[async_trait]
impl Remote for HttpRemote {
  async fn fetch_page(
    &self,
    method: Method,
    scope: &ScopeKey,
    offset: usize,
    count: usize,
  ) -> Result<Vec<Value>> {
    let mut url = self.endpoint(&[method.path()]);
    url
      .query_pairs_mut()
      .append_pair("offset", &offset.to_string())
      .append_pair("count", &count.to_string())
      .extend_pairs(scope.query_pairs());

    match self.get(url).await? {
      Some(Value::Array(items)) => Ok(items),
      Some(other) => Err(Error::InvalidOperation(format!(
        "{} returned a non-list body: {}",
        method, other
      ))),
      None => Err(Error::InvalidOperation(format!("{} returned no list", method))),
    }
  }

  async fn fetch_one(&self, method: Method, id: i64) -> Result<Option<Value>> {
    let id = id.to_string();
    self.get(self.endpoint(&[method.path(), id.as_str()])).await
  }

  async fn fetch_scalar(&self, method: Method, scope: &ScopeKey) -> Result<Option<Value>> {
    let mut url = self.endpoint(&[method.path()]);
    let pairs = scope.query_pairs();
    if !pairs.is_empty() {
      url.query_pairs_mut().extend_pairs(pairs);
    }
    self.get(url).await
  }
}
