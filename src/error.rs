//! Error taxonomy shared by every cache component.

use thiserror::Error;

/// Errors surfaced by the cache and the remote boundary.
#[derive(Debug, Clone, Error)]
pub enum Error {
  /// Lookup by id against the materialized set missed. Not retried.
  #[error("{kind} {id} is not in the loaded set")]
  NotFound { kind: &'static str, id: i64 },

  /// A fetch failed. Cache state is untouched and the operation may be retried.
  #[error("remote unavailable: {0}")]
  RemoteUnavailable(String),

  /// The remote returned nothing (or garbage) where a value was mandatory.
  #[error("invalid operation: {0}")]
  InvalidOperation(String),

  /// The operation's cancellation token fired before the fetch completed.
  #[error("operation cancelled")]
  Cancelled,

  /// The offline mirror could not read or write its database.
  #[error("cache storage: {0}")]
  Storage(String),
}

impl Error {
  pub fn not_found(kind: &'static str, id: i64) -> Self {
    Self::NotFound { kind, id }
  }

  /// Whether repeating the same call may succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(self, Self::RemoteUnavailable(_) | Self::Cancelled)
  }
}

impl From<rusqlite::Error> for Error {
  fn from(e: rusqlite::Error) -> Self {
    Self::Storage(e.to_string())
  }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_retryable_kinds() {
    assert!(Error::RemoteUnavailable("down".into()).is_retryable());
    assert!(Error::Cancelled.is_retryable());
    assert!(!Error::not_found("mark", 3).is_retryable());
    assert!(!Error::InvalidOperation("null".into()).is_retryable());
  }

  #[test]
  fn test_not_found_message() {
    assert_eq!(
      Error::not_found("task", 42).to_string(),
      "task 42 is not in the loaded set"
    );
  }
}
