//! Deferred single-init cache.
//!
//! Wraps an async factory so its value is computed at most once, on first
//! access, and memoized thereafter. Concurrent first accesses wait on the same
//! initialization instead of racing.
//!
//! Failures are not memoized: if the factory returns an error (including
//! [`Error::Cancelled`](crate::Error::Cancelled)) the cache stays un-forced and
//! the next access runs the factory again.
//!
//! # Example
//!
//! ```ignore
//! let ctx = ctx.clone();
//! let subjects = Deferred::new(move || {
//!     let ctx = ctx.clone();
//!     async move { ctx.all::<Subject>(Method::Subjects, &ScopeKey::new()).await }
//! });
//!
//! assert!(!subjects.is_forced());
//! let list = subjects.force().await?;
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use tokio::sync::OnceCell;

use crate::error::Result;

/// A factory function that creates the future computing the value
type FactoryFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T>> + Send + Sync>;

pub struct Deferred<T> {
  cell: OnceCell<T>,
  factory: FactoryFn<T>,
}

impl<T: Send + Sync + 'static> Deferred<T> {
  /// Create a deferred value. The factory is not invoked until the first
  /// `force()`.
  pub fn new<F, Fut>(factory: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T>> + Send + 'static,
  {
    Self {
      cell: OnceCell::new(),
      factory: Box::new(move || Box::pin(factory())),
    }
  }

  /// Get the value, running the factory if this is the first access.
  pub async fn force(&self) -> Result<&T> {
    self.cell.get_or_try_init(|| (self.factory)()).await
  }

  /// Whether a `force()` has completed successfully.
  pub fn is_forced(&self) -> bool {
    self.cell.initialized()
  }

  /// The value if already forced. Never runs the factory.
  pub fn get(&self) -> Option<&T> {
    self.cell.get()
  }
}

impl<T: std::fmt::Debug> std::fmt::Debug for Deferred<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Deferred")
      .field("value", &self.cell.get())
      .finish_non_exhaustive()
  }
}
