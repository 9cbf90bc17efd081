//! Lazy paginated collection.
//!
//! An ordered cache of entities fetched page by page from the remote. The
//! first access hydrates the first page; `load_next` pulls one more page at
//! the cursor. Every state transition holds the collection's lock for its
//! whole duration, including the remote fetch, so one operation is in flight
//! per instance and the rest queue behind it.

use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::deferred::Deferred;
use super::traits::{Cursor, Identified, Order, ScopeKey};
use crate::error::{Error, Result};
use crate::remote::{Method, SyncContext};

/// Which list method serves a scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListRoute {
  Fixed(Method),
  /// `all` when the scope's subject is unset or 0, `subject` otherwise
  PerSubject { all: Method, subject: Method },
}

impl ListRoute {
  pub fn resolve(&self, scope: &ScopeKey) -> Method {
    match *self {
      Self::Fixed(method) => method,
      Self::PerSubject { all, subject } => match scope.subject_id {
        Some(id) if id != crate::school::ALL_SUBJECTS => subject,
        _ => all,
      },
    }
  }
}

/// Remote methods a collection reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
  pub list: ListRoute,
  pub single: Method,
}

impl Route {
  pub const fn new(list: Method, single: Method) -> Self {
    Self {
      list: ListRoute::Fixed(list),
      single,
    }
  }
}

/// The materialized state behind the lock
#[derive(Debug)]
struct Listing<T> {
  items: Vec<T>,
  cursor: Cursor,
  /// Scope the current items were loaded under
  scope: ScopeKey,
}

impl<T: Identified> Listing<T> {
  fn new(scope: ScopeKey, page_size: usize) -> Self {
    Self {
      items: Vec::new(),
      cursor: Cursor::new(page_size),
      scope,
    }
  }

  fn position(&self, id: i64) -> Option<usize> {
    self.items.iter().position(|item| item.id() == id)
  }

  /// Splice a fetched page in, skipping ids already present. Returns the
  /// number of items added.
  ///
  /// Pages are requested one item past the page size; the extra item only
  /// tells whether anything follows and is dropped.
  fn merge_page(&mut self, mut page: Vec<T>, order: Order) -> usize {
    let more = page.len() > self.cursor.page_size;
    page.truncate(self.cursor.page_size);
    let fetched = page.len();

    let mut fresh: Vec<T> = Vec::with_capacity(fetched);
    for item in page {
      let id = item.id();
      if self.position(id).is_none() && !fresh.iter().any(|f| f.id() == id) {
        fresh.push(item);
      }
    }
    let added = fresh.len();

    match order {
      Order::Oldest => self.items.extend(fresh),
      Order::NewestFirst => {
        fresh.reverse();
        self.items.splice(0..0, fresh);
      }
    }

    self.cursor.advance(fetched, more);
    added
  }

  /// Insert at `index` (clamped), or replace in place if the id is present.
  fn upsert(&mut self, index: Option<usize>, item: T) {
    match self.position(item.id()) {
      Some(pos) => self.items[pos] = item,
      None => {
        let index = index.unwrap_or(self.items.len()).min(self.items.len());
        self.items.insert(index, item);
        self.cursor.offset += 1;
      }
    }
  }
}

pub struct PagedCollection<T> {
  ctx: SyncContext,
  route: Route,
  order: Order,
  /// Scope of the loaded items. Before hydration, the scope the first load
  /// will use. Only written by `rescope` while it holds `rescoping`.
  scope: Arc<StdMutex<ScopeKey>>,
  listing: Deferred<Mutex<Listing<T>>>,
  rescoping: Mutex<()>,
}

impl<T: Identified> PagedCollection<T> {
  /// A collection whose pages arrive in display order.
  pub fn new(ctx: SyncContext, route: Route, scope: ScopeKey) -> Self {
    Self::with_order(ctx, route, scope, Order::Oldest)
  }

  /// A collection whose pages arrive newest first but display oldest first.
  pub fn newest_first(ctx: SyncContext, route: Route, scope: ScopeKey) -> Self {
    Self::with_order(ctx, route, scope, Order::NewestFirst)
  }

  pub fn with_order(ctx: SyncContext, route: Route, scope: ScopeKey, order: Order) -> Self {
    let scope = Arc::new(StdMutex::new(scope));

    let factory_ctx = ctx.clone();
    let factory_scope = Arc::clone(&scope);
    let listing = Deferred::new(move || {
      let ctx = factory_ctx.clone();
      let scope = read_scope(&factory_scope);
      async move {
        let mut listing = Listing::new(scope, ctx.page_size());
        let page = fetch_page(&ctx, route, &listing.scope, listing.cursor).await?;
        listing.merge_page(page, order);
        debug!(
          kind = T::kind(),
          count = listing.items.len(),
          exhausted = listing.cursor.exhausted,
          "hydrated collection"
        );
        Ok(Mutex::new(listing))
      }
    });

    Self {
      ctx,
      route,
      order,
      scope,
      listing,
      rescoping: Mutex::new(()),
    }
  }

  async fn lock(&self) -> Result<MutexGuard<'_, Listing<T>>> {
    Ok(self.listing.force().await?.lock().await)
  }

  /// Whether the first page has been loaded.
  pub fn is_materialized(&self) -> bool {
    self.listing.is_forced()
  }

  pub fn order(&self) -> Order {
    self.order
  }

  /// The scope this collection loads (or will load) under.
  pub fn scope(&self) -> ScopeKey {
    read_scope(&self.scope)
  }

  pub async fn len(&self) -> Result<usize> {
    Ok(self.lock().await?.items.len())
  }

  pub async fn is_empty(&self) -> Result<bool> {
    Ok(self.len().await? == 0)
  }

  /// Snapshot of the materialized items in display order.
  pub async fn items(&self) -> Result<Vec<T>> {
    Ok(self.lock().await?.items.clone())
  }

  pub async fn cursor(&self) -> Result<Cursor> {
    Ok(self.lock().await?.cursor)
  }

  pub async fn contains(&self, id: i64) -> Result<bool> {
    Ok(self.lock().await?.position(id).is_some())
  }

  /// Look up a materialized item. Items beyond the loaded prefix are
  /// `NotFound` until paged in.
  pub async fn get_by_id(&self, id: i64) -> Result<T> {
    let listing = self.lock().await?;
    listing
      .position(id)
      .map(|pos| listing.items[pos].clone())
      .ok_or_else(|| Error::not_found(T::kind(), id))
  }

  /// Fetch the page at the cursor. Returns the number of items added.
  ///
  /// On a collection that has not been hydrated yet this only hydrates,
  /// since hydration is the first page.
  pub async fn load_next(&self) -> Result<usize> {
    if !self.listing.is_forced() {
      return Ok(self.lock().await?.items.len());
    }

    let mut listing = self.lock().await?;
    if listing.cursor.exhausted {
      return Ok(0);
    }

    let page = fetch_page(&self.ctx, self.route, &listing.scope, listing.cursor).await?;
    let added = listing.merge_page(page, self.order);
    debug!(
      kind = T::kind(),
      added,
      offset = listing.cursor.offset,
      exhausted = listing.cursor.exhausted,
      "loaded page"
    );
    Ok(added)
  }

  /// Make sure at least `pages` pages are loaded, stopping early once the
  /// remote runs out. Pages already loaded, including one loaded by a scope
  /// change, count toward `pages`. Returns the number of items.
  pub async fn load_pages(&self, pages: usize) -> Result<usize> {
    let mut listing = self.lock().await?;
    let page_size = listing.cursor.page_size;
    while !listing.cursor.exhausted && listing.cursor.offset < pages.saturating_mul(page_size) {
      let page = fetch_page(&self.ctx, self.route, &listing.scope, listing.cursor).await?;
      listing.merge_page(page, self.order);
    }
    debug!(kind = T::kind(), count = listing.items.len(), pages, "loaded pages");
    Ok(listing.items.len())
  }

  /// Empty the list and restart pagination from the first page.
  pub async fn clear(&self) -> Result<()> {
    let mut listing = self.lock().await?;
    listing.items.clear();
    listing.cursor.reset(0);
    Ok(())
  }

  /// Fetch one entity by id without touching the list.
  pub async fn fetch_one(&self, id: i64) -> Result<T> {
    self.ctx.one::<T>(self.route.single, id).await
  }

  /// Fetch one entity and add it at the tail.
  pub async fn append(&self, id: i64) -> Result<()> {
    let mut listing = self.lock().await?;
    let item = self.ctx.one::<T>(self.route.single, id).await?;
    listing.upsert(None, item);
    Ok(())
  }

  /// Fetch one entity and add it at `index` (clamped to the length).
  pub async fn insert(&self, index: usize, id: i64) -> Result<()> {
    let mut listing = self.lock().await?;
    let item = self.ctx.one::<T>(self.route.single, id).await?;
    listing.upsert(Some(index), item);
    Ok(())
  }

  pub async fn append_item(&self, item: T) -> Result<()> {
    self.lock().await?.upsert(None, item);
    Ok(())
  }

  pub async fn insert_item(&self, index: usize, item: T) -> Result<()> {
    self.lock().await?.upsert(Some(index), item);
    Ok(())
  }

  /// Remove by id. The cursor steps back so the next page does not skip the
  /// item that slides into the vacated remote offset.
  pub async fn remove(&self, id: i64) -> Result<Option<T>> {
    let mut listing = self.lock().await?;
    match listing.position(id) {
      Some(pos) => {
        let item = listing.items.remove(pos);
        listing.cursor.offset = listing.cursor.offset.saturating_sub(1);
        Ok(Some(item))
      }
      None => Ok(None),
    }
  }

  /// Overwrite the item with the same id in place. Returns false when absent.
  pub async fn replace(&self, item: T) -> Result<bool> {
    let mut listing = self.lock().await?;
    match listing.position(item.id()) {
      Some(pos) => {
        listing.items[pos] = item;
        Ok(true)
      }
      None => Ok(false),
    }
  }

  /// Re-fetch one materialized item and overwrite it in place.
  pub async fn refresh(&self, id: i64) -> Result<bool> {
    let mut listing = self.lock().await?;
    let Some(pos) = listing.position(id) else {
      return Ok(false);
    };
    let item = self.ctx.one::<T>(self.route.single, id).await?;
    listing.items[pos] = item;
    Ok(true)
  }

  /// Mutate every item in place; `f` returns whether it changed the item.
  pub async fn update_each<F>(&self, mut f: F) -> Result<usize>
  where
    F: FnMut(&mut T) -> bool,
  {
    let mut listing = self.lock().await?;
    let mut changed = 0;
    for item in listing.items.iter_mut() {
      if f(item) {
        changed += 1;
      }
    }
    Ok(changed)
  }

  /// Change the scope and load the first page under it.
  ///
  /// The new page is fetched before anything is discarded, so a failed fetch
  /// leaves the old items and scope in place. Scope changes on one collection
  /// run one at a time; each applies `f` to the scope left by the previous
  /// one. Returns false when the scope is unchanged.
  pub async fn rescope<F>(&self, f: F) -> Result<bool>
  where
    F: FnOnce(&mut ScopeKey),
  {
    let _rescoping = self.rescoping.lock().await;
    let previous = self.scope();
    let mut target = previous.clone();
    f(&mut target);
    if target == previous {
      return Ok(false);
    }

    if !self.is_materialized() {
      // Hydration picks the new scope up from the factory
      write_scope(&self.scope, target.clone());
    }
    let mut listing = match self.lock().await {
      Ok(listing) => listing,
      Err(e) => {
        write_scope(&self.scope, previous);
        return Err(e);
      }
    };
    if listing.scope != target {
      if let Err(e) = self.reload_locked(&mut listing, target.clone()).await {
        write_scope(&self.scope, listing.scope.clone());
        return Err(e);
      }
    }
    write_scope(&self.scope, target);
    Ok(true)
  }

  /// Drop everything and load the first page of the current scope again.
  pub async fn reload(&self) -> Result<()> {
    let mut listing = self.lock().await?;
    let scope = listing.scope.clone();
    self.reload_locked(&mut listing, scope).await
  }

  async fn reload_locked(&self, listing: &mut Listing<T>, scope: ScopeKey) -> Result<()> {
    let mut fresh = Listing::new(scope, self.ctx.page_size());
    let page = fetch_page(&self.ctx, self.route, &fresh.scope, fresh.cursor).await?;
    fresh.merge_page(page, self.order);
    debug!(kind = T::kind(), scope = ?fresh.scope, count = fresh.items.len(), "reloaded");
    *listing = fresh;
    Ok(())
  }
}

fn read_scope(scope: &StdMutex<ScopeKey>) -> ScopeKey {
  scope.lock().unwrap_or_else(|e| e.into_inner()).clone()
}

fn write_scope(scope: &StdMutex<ScopeKey>, next: ScopeKey) {
  *scope.lock().unwrap_or_else(|e| e.into_inner()) = next;
}

async fn fetch_page<T: Identified>(
  ctx: &SyncContext,
  route: Route,
  scope: &ScopeKey,
  cursor: Cursor,
) -> Result<Vec<T>> {
  ctx
    .page(route.list.resolve(scope), scope, cursor.offset, cursor.page_size + 1)
    .await
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::mock::MockRemote;
  use crate::school::{Message, Person};
  use serde_json::json;
  use std::time::Duration;

  const PEOPLE: Route = Route::new(Method::People, Method::Person);
  const MESSAGES: Route = Route::new(Method::Messages, Method::Message);

  fn seed_people(mock: &MockRemote, names: &[&str]) {
    mock.seed(
      Method::People,
      names
        .iter()
        .enumerate()
        .map(|(i, name)| json!({ "id": i as i64 + 1, "display_name": name })),
    );
  }

  fn collection(mock: &Arc<MockRemote>, page_size: usize) -> PagedCollection<Person> {
    let ctx = SyncContext::new(mock.clone()).with_page_size(page_size);
    PagedCollection::new(ctx, PEOPLE, ScopeKey::new())
  }

  #[tokio::test]
  async fn test_pagination_terminates_after_ceil_pages() {
    let mock = MockRemote::new();
    let names: Vec<String> = (1..=10).map(|i| format!("Student {}", i)).collect();
    seed_people(&mock, &names.iter().map(String::as_str).collect::<Vec<_>>());
    let people = collection(&mock, 3);

    // ceil(10 / 3) = 4
    for _ in 0..4 {
      people.load_next().await.unwrap();
    }
    assert!(people.cursor().await.unwrap().exhausted);
    assert_eq!(people.len().await.unwrap(), 10);
    assert_eq!(mock.calls(Method::People), 4);

    assert_eq!(people.load_next().await.unwrap(), 0);
    assert_eq!(mock.calls(Method::People), 4);
  }

  #[tokio::test]
  async fn test_pagination_terminates_on_exact_multiple() {
    let mock = MockRemote::new();
    let names: Vec<String> = (1..=9).map(|i| format!("Student {}", i)).collect();
    seed_people(&mock, &names.iter().map(String::as_str).collect::<Vec<_>>());
    let people = collection(&mock, 3);

    for _ in 0..3 {
      people.load_next().await.unwrap();
    }
    assert!(people.cursor().await.unwrap().exhausted);
    assert_eq!(people.len().await.unwrap(), 9);
    assert_eq!(mock.calls(Method::People), 3);

    assert_eq!(people.load_next().await.unwrap(), 0);
    assert_eq!(mock.calls(Method::People), 3);
  }

  #[tokio::test]
  async fn test_concurrent_loads_are_serialized() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Boris", "Ivan", "Olga", "Pavel", "Vera"]);
    let people = collection(&mock, 2);
    people.len().await.unwrap();
    mock.set_latency(Duration::from_millis(20));

    let (a, b) = tokio::join!(people.load_next(), people.load_next());
    assert_eq!((a.unwrap(), b.unwrap()), (2, 2));

    let offsets: Vec<(usize, usize)> = mock
      .requests(Method::People)
      .iter()
      .map(|r| (r.offset, r.count))
      .collect();
    assert_eq!(offsets, vec![(0, 3), (2, 3), (4, 3)]);

    let ids: Vec<i64> = people.items().await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![1, 2, 3, 4, 5, 6]);
    assert!(people.cursor().await.unwrap().exhausted);
  }

  #[tokio::test]
  async fn test_len_hydrates_first_page_only() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Boris", "Ivan", "Olga"]);
    let people = collection(&mock, 2);

    assert!(!people.is_materialized());
    assert_eq!(people.len().await.unwrap(), 2);
    assert!(people.is_materialized());

    // Id 4 exists remotely but is not paged in yet
    assert!(matches!(
      people.get_by_id(4).await,
      Err(Error::NotFound { kind: "person", id: 4 })
    ));
    people.load_next().await.unwrap();
    assert_eq!(people.get_by_id(4).await.unwrap().display_name, "Olga");
  }

  #[tokio::test]
  async fn test_failed_page_leaves_state_untouched() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Boris", "Ivan"]);
    let people = collection(&mock, 2);
    people.len().await.unwrap();

    mock.fail_next(Method::People, 1);
    assert!(matches!(
      people.load_next().await,
      Err(Error::RemoteUnavailable(_))
    ));
    let cursor = people.cursor().await.unwrap();
    assert_eq!((cursor.offset, cursor.exhausted), (2, false));

    assert_eq!(people.load_next().await.unwrap(), 1);
    assert!(people.cursor().await.unwrap().exhausted);
  }

  #[tokio::test]
  async fn test_failed_hydration_is_retried() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna"]);
    let people = collection(&mock, 5);

    mock.fail_next(Method::People, 1);
    assert!(people.len().await.is_err());
    assert!(!people.is_materialized());
    assert_eq!(people.len().await.unwrap(), 1);
  }

  #[tokio::test]
  async fn test_append_and_insert_fetch_by_id() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Boris"]);
    let people = collection(&mock, 10);
    people.len().await.unwrap();

    mock.put(Method::People, json!({ "id": 3, "display_name": "Ivan" }));
    mock.put(Method::People, json!({ "id": 4, "display_name": "Olga" }));
    people.append(3).await.unwrap();
    people.insert(0, 4).await.unwrap();

    let ids: Vec<i64> = people.items().await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![4, 1, 2, 3]);
    assert_eq!(people.cursor().await.unwrap().offset, 4);
    assert_eq!(mock.calls(Method::Person), 2);
  }

  #[tokio::test]
  async fn test_append_known_id_replaces_in_place() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Boris"]);
    let people = collection(&mock, 10);
    people.len().await.unwrap();

    mock.put(Method::People, json!({ "id": 1, "display_name": "Anna K." }));
    people.append(1).await.unwrap();

    let items = people.items().await.unwrap();
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].display_name, "Anna K.");
    assert_eq!(people.cursor().await.unwrap().offset, 2);
  }

  #[tokio::test]
  async fn test_clear_keeps_materialized_and_restarts() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Boris", "Ivan"]);
    let people = collection(&mock, 2);
    people.len().await.unwrap();

    people.clear().await.unwrap();
    assert!(people.is_materialized());
    assert_eq!(people.len().await.unwrap(), 0);
    assert_eq!(people.cursor().await.unwrap(), Cursor::new(2));

    assert_eq!(people.load_next().await.unwrap(), 2);
    assert_eq!(people.get_by_id(1).await.unwrap().display_name, "Anna");
  }

  #[tokio::test]
  async fn test_remove_steps_cursor_back() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Boris", "Ivan"]);
    let people = collection(&mock, 2);
    people.len().await.unwrap();

    mock.delete(Method::People, 1);
    assert!(people.remove(1).await.unwrap().is_some());
    assert!(people.remove(1).await.unwrap().is_none());

    people.load_next().await.unwrap();
    let ids: Vec<i64> = people.items().await.unwrap().iter().map(|p| p.id).collect();
    assert_eq!(ids, vec![2, 3]);
  }

  #[tokio::test]
  async fn test_newest_first_displays_oldest_first() {
    let mock = MockRemote::new();
    mock.seed(
      Method::Messages,
      (1..=5).map(|id| {
        json!({
          "id": id, "chat_id": 9, "sender_id": 1,
          "text": format!("m{}", id), "sent_at": "2026-10-01T10:00:00Z"
        })
      }),
    );
    let ctx = SyncContext::new(mock.clone()).with_page_size(2);
    let messages: PagedCollection<Message> =
      PagedCollection::newest_first(ctx, MESSAGES, ScopeKey::new().with_chat(9));

    messages.len().await.unwrap();
    messages.load_next().await.unwrap();

    let ids: Vec<i64> = messages.items().await.unwrap().iter().map(|m| m.id).collect();
    assert_eq!(ids, vec![2, 3, 4, 5]);
  }

  #[tokio::test]
  async fn test_rescope_failure_keeps_old_items() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Ivan", "Ivanna"]);
    let people = collection(&mock, 10);
    assert_eq!(people.len().await.unwrap(), 3);

    mock.fail_next(Method::People, 1);
    assert!(people.rescope(|s| s.filter = Some("Iv".into())).await.is_err());
    assert_eq!(people.len().await.unwrap(), 3);
    assert_eq!(people.scope().filter, None);

    assert!(people.rescope(|s| s.filter = Some("Iv".into())).await.unwrap());
    assert_eq!(people.len().await.unwrap(), 2);
  }

  #[tokio::test]
  async fn test_concurrent_rescopes_apply_in_turn() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Ivan", "Olga"]);
    let people = collection(&mock, 10);
    people.len().await.unwrap();
    mock.set_latency(Duration::from_millis(20));
    mock.fail_next(Method::People, 1);

    let (first, second) = tokio::join!(
      people.rescope(|s| s.filter = Some("Iv".into())),
      people.rescope(|s| s.filter = Some("Ol".into())),
    );
    assert!(matches!(first, Err(Error::RemoteUnavailable(_))));
    assert!(second.unwrap());

    assert_eq!(people.scope().filter.as_deref(), Some("Ol"));
    let names = |items: Vec<Person>| -> Vec<String> {
      items.into_iter().map(|p| p.display_name).collect()
    };
    assert_eq!(names(people.items().await.unwrap()), vec!["Olga"]);

    people.reload().await.unwrap();
    assert_eq!(names(people.items().await.unwrap()), vec!["Olga"]);
  }

  #[tokio::test]
  async fn test_load_pages_counts_page_loaded_by_rescope() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Ivan", "Ivanna", "Ivar", "Olga"]);
    let people = collection(&mock, 2);
    people.len().await.unwrap();

    people.rescope(|s| s.filter = Some("Iv".into())).await.unwrap();
    assert_eq!(mock.calls(Method::People), 2);

    assert_eq!(people.load_pages(1).await.unwrap(), 2);
    assert_eq!(mock.calls(Method::People), 2);

    assert_eq!(people.load_pages(5).await.unwrap(), 3);
    assert_eq!(mock.calls(Method::People), 3);
    assert!(people.cursor().await.unwrap().exhausted);
  }

  #[tokio::test]
  async fn test_rescope_before_hydration_fetches_once() {
    let mock = MockRemote::new();
    seed_people(&mock, &["Anna", "Ivan", "Ivanna"]);
    let people = collection(&mock, 10);

    assert!(people.rescope(|s| s.filter = Some("Iv".into())).await.unwrap());
    assert_eq!(people.len().await.unwrap(), 2);
    assert_eq!(mock.calls(Method::People), 1);

    assert!(!people.rescope(|s| s.filter = Some("Iv".into())).await.unwrap());
    assert_eq!(mock.calls(Method::People), 1);
  }

  #[test]
  fn test_route_resolves_by_subject() {
    let route = ListRoute::PerSubject {
      all: Method::Tasks,
      subject: Method::SubjectTasks,
    };
    assert_eq!(route.resolve(&ScopeKey::new()), Method::Tasks);
    assert_eq!(route.resolve(&ScopeKey::new().with_subject(0)), Method::Tasks);
    assert_eq!(
      route.resolve(&ScopeKey::new().with_subject(4)),
      Method::SubjectTasks
    );
  }
}
