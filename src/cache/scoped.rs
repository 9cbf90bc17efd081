//! Collections with an extra query dimension.
//!
//! Each setter changes one component of the scope key, then discards the
//! materialized items and loads the first page under the new key. Setting a
//! value equal to the current one does nothing.

use std::ops::Deref;

use super::paged::{PagedCollection, Route};
use super::traits::{Identified, ScopeKey};
use crate::error::Result;
use crate::remote::{Method, SyncContext};
use crate::school::{Person, TaskStatus};

pub const PEOPLE: Route = Route::new(Method::People, Method::Person);

pub struct ScopedCollection<T> {
  inner: PagedCollection<T>,
}

impl<T: Identified> ScopedCollection<T> {
  pub fn new(ctx: SyncContext, route: Route, scope: ScopeKey) -> Self {
    Self {
      inner: PagedCollection::new(ctx, route, scope),
    }
  }

  pub fn from_paged(inner: PagedCollection<T>) -> Self {
    Self { inner }
  }

  /// Free-text filter; an empty string clears it.
  pub async fn set_filter(&self, filter: impl Into<String>) -> Result<bool> {
    let filter = filter.into();
    let filter = (!filter.trim().is_empty()).then_some(filter);
    self.inner.rescope(|s| s.filter = filter).await
  }

  pub async fn set_status(&self, status: Option<TaskStatus>) -> Result<bool> {
    self.inner.rescope(|s| s.status = status).await
  }

  pub async fn set_subject(&self, subject_id: Option<i64>) -> Result<bool> {
    self.inner.rescope(|s| s.subject_id = subject_id).await
  }

  pub async fn set_class(&self, class_id: Option<i64>) -> Result<bool> {
    self.inner.rescope(|s| s.class_id = class_id).await
  }
}

impl<T> Deref for ScopedCollection<T> {
  type Target = PagedCollection<T>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

/// Directory of people, searchable by display-name prefix.
pub fn people(ctx: SyncContext, class_id: Option<i64>) -> ScopedCollection<Person> {
  let scope = ScopeKey {
    class_id,
    ..ScopeKey::default()
  };
  ScopedCollection::new(ctx, PEOPLE, scope)
}
