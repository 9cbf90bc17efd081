//! Chat list and per-chat message history.

use async_trait::async_trait;
use std::ops::Deref;
use tokio::sync::Mutex;
use tracing::debug;

use super::paged::{PagedCollection, Route};
use super::scoped::ScopedCollection;
use super::traits::{EventSink, ScopeKey};
use crate::error::Result;
use crate::event::{Notifier, PushEvent};
use crate::remote::{Method, SyncContext};
use crate::school::{Chat, Message};

pub const CHATS: Route = Route::new(Method::Chats, Method::Chat);
pub const MESSAGES: Route = Route::new(Method::Messages, Method::Message);

/// The viewer's chat sessions, searchable by title prefix.
pub struct ChatCollection {
  inner: ScopedCollection<Chat>,
  events: Mutex<()>,
  notifier: Notifier<PushEvent>,
}

impl ChatCollection {
  pub fn new(ctx: SyncContext) -> Self {
    Self {
      inner: ScopedCollection::new(ctx, CHATS, ScopeKey::new()),
      events: Mutex::new(()),
      notifier: Notifier::default(),
    }
  }

  pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PushEvent> {
    self.notifier.subscribe()
  }

  fn matches_filter(&self, chat: &Chat) -> bool {
    match self.inner.scope().filter {
      Some(filter) => chat
        .title
        .to_lowercase()
        .starts_with(&filter.to_lowercase()),
      None => true,
    }
  }

  pub async fn on_presence_changed(&self, user_id: i64, online: bool) -> Result<()> {
    if self.inner.is_materialized() {
      let _guard = self.events.lock().await;
      let changed = self
        .inner
        .update_each(|chat| {
          let hit = chat.interlocutor_id == user_id && chat.online != online;
          if hit {
            chat.online = online;
          }
          hit
        })
        .await?;
      debug!(user_id, online, changed, "presence changed");
    }
    self
      .notifier
      .emit(PushEvent::PresenceChanged { user_id, online });
    Ok(())
  }

  pub async fn on_photo_updated(&self, user_id: i64, photo: Option<String>) -> Result<()> {
    if self.inner.is_materialized() {
      let _guard = self.events.lock().await;
      self
        .inner
        .update_each(|chat| {
          let hit = chat.interlocutor_id == user_id;
          if hit {
            chat.photo = photo.clone();
          }
          hit
        })
        .await?;
    }
    self.notifier.emit(PushEvent::PhotoUpdated { user_id, photo });
    Ok(())
  }

  /// A new session shows first, unless the active filter excludes it.
  pub async fn on_session_created(&self, chat_id: i64) -> Result<()> {
    if self.inner.is_materialized() {
      let _guard = self.events.lock().await;
      let chat = self.inner.fetch_one(chat_id).await?;
      if self.matches_filter(&chat) {
        self.inner.insert_item(0, chat).await?;
        debug!(chat_id, "session opened");
      }
    }
    self.notifier.emit(PushEvent::SessionCreated { chat_id });
    Ok(())
  }

  pub async fn on_session_closed(&self, chat_id: i64) -> Result<()> {
    if self.inner.is_materialized() {
      let _guard = self.events.lock().await;
      self.inner.remove(chat_id).await?;
    }
    self.notifier.emit(PushEvent::SessionClosed { chat_id });
    Ok(())
  }
}

impl Deref for ChatCollection {
  type Target = ScopedCollection<Chat>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

#[async_trait]
impl EventSink for ChatCollection {
  fn is_materialized(&self) -> bool {
    self.inner.is_materialized()
  }

  async fn apply_event(&self, event: &PushEvent) -> Result<()> {
    match event {
      PushEvent::PresenceChanged { user_id, online } => {
        self.on_presence_changed(*user_id, *online).await
      }
      PushEvent::PhotoUpdated { user_id, photo } => {
        self.on_photo_updated(*user_id, photo.clone()).await
      }
      PushEvent::SessionCreated { chat_id } => self.on_session_created(*chat_id).await,
      PushEvent::SessionClosed { chat_id } => self.on_session_closed(*chat_id).await,
      _ => Ok(()),
    }
  }
}

/// History of one chat. The server pages newest first; the list reads oldest
/// to newest and `load_next` prepends older messages.
pub struct MessageCollection {
  chat_id: i64,
  inner: PagedCollection<Message>,
  notifier: Notifier<PushEvent>,
}

impl MessageCollection {
  pub fn new(ctx: SyncContext, chat_id: i64) -> Self {
    Self {
      chat_id,
      inner: PagedCollection::newest_first(ctx, MESSAGES, ScopeKey::new().with_chat(chat_id)),
      notifier: Notifier::default(),
    }
  }

  pub fn chat_id(&self) -> i64 {
    self.chat_id
  }

  pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<PushEvent> {
    self.notifier.subscribe()
  }

  pub async fn on_message_received(&self, message_id: i64) -> Result<()> {
    if self.inner.is_materialized() {
      self.inner.append(message_id).await?;
      debug!(chat_id = self.chat_id, message_id, "message received");
    }
    self.notifier.emit(PushEvent::MessageReceived {
      chat_id: self.chat_id,
      message_id,
    });
    Ok(())
  }
}

impl Deref for MessageCollection {
  type Target = PagedCollection<Message>;

  fn deref(&self) -> &Self::Target {
    &self.inner
  }
}

#[async_trait]
impl EventSink for MessageCollection {
  fn is_materialized(&self) -> bool {
    self.inner.is_materialized()
  }

  async fn apply_event(&self, event: &PushEvent) -> Result<()> {
    match *event {
      PushEvent::MessageReceived {
        chat_id,
        message_id,
      } if chat_id == self.chat_id => self.on_message_received(message_id).await,
      _ => Ok(()),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::remote::mock::MockRemote;
  use serde_json::{json, Value};
  use std::sync::Arc;
  use tokio::sync::broadcast::error::TryRecvError;

  fn chat(id: i64, user: i64, title: &str) -> Value {
    json!({ "id": id, "interlocutor_id": user, "title": title, "online": false })
  }

  fn message(id: i64, chat_id: i64) -> Value {
    json!({
      "id": id,
      "chat_id": chat_id,
      "sender_id": 5,
      "text": format!("message {}", id),
      "sent_at": "2026-10-10T12:00:00Z",
    })
  }

  fn inbox() -> Arc<MockRemote> {
    let mock = MockRemote::new();
    mock.seed(
      Method::Chats,
      vec![
        chat(1, 100, "Anna Volkova"),
        chat(2, 200, "Boris Orlov"),
        chat(3, 100, "Anna (class 7B)"),
      ],
    );
    mock.seed(Method::Messages, (1..=5).map(|id| message(id, 1)));
    mock
  }

  fn ids<T: crate::cache::Identified>(items: &[T]) -> Vec<i64> {
    items.iter().map(|i| i.id()).collect()
  }

  #[tokio::test]
  async fn test_presence_updates_every_chat_with_user() {
    let mock = inbox();
    let chats = ChatCollection::new(SyncContext::new(mock));
    chats.len().await.unwrap();
    let mut raised = chats.subscribe();

    chats.on_presence_changed(100, true).await.unwrap();

    let online: Vec<_> = chats
      .items()
      .await
      .unwrap()
      .into_iter()
      .filter(|c| c.online)
      .map(|c| c.id)
      .collect();
    assert_eq!(online, vec![1, 3]);
    assert!(raised.recv().await.is_ok());
    assert!(matches!(raised.try_recv(), Err(TryRecvError::Empty)));
  }

  #[tokio::test]
  async fn test_photo_update() {
    let mock = inbox();
    let chats = ChatCollection::new(SyncContext::new(mock));
    chats.len().await.unwrap();

    chats
      .on_photo_updated(200, Some("boris.png".into()))
      .await
      .unwrap();

    assert_eq!(chats.get_by_id(2).await.unwrap().photo.as_deref(), Some("boris.png"));
    assert_eq!(chats.get_by_id(1).await.unwrap().photo, None);
  }

  #[tokio::test]
  async fn test_session_lifecycle() {
    let mock = inbox();
    let chats = ChatCollection::new(SyncContext::new(mock.clone()));
    chats.len().await.unwrap();

    mock.put(Method::Chats, chat(4, 300, "Olga Popova"));
    chats.on_session_created(4).await.unwrap();
    assert_eq!(ids(&chats.items().await.unwrap()), vec![4, 1, 2, 3]);

    chats.on_session_closed(2).await.unwrap();
    assert_eq!(ids(&chats.items().await.unwrap()), vec![4, 1, 3]);
  }

  #[tokio::test]
  async fn test_filtered_view_skips_foreign_session() {
    let mock = inbox();
    let chats = ChatCollection::new(SyncContext::new(mock.clone()));
    chats.set_filter("anna").await.unwrap();
    assert_eq!(ids(&chats.items().await.unwrap()), vec![1, 3]);

    mock.put(Method::Chats, chat(4, 300, "Olga Popova"));
    chats.on_session_created(4).await.unwrap();

    assert!(!chats.contains(4).await.unwrap());
  }

  #[tokio::test]
  async fn test_unopened_chat_list_only_reraises() {
    let mock = inbox();
    let chats = ChatCollection::new(SyncContext::new(mock.clone()));
    let mut raised = chats.subscribe();

    chats.on_session_created(1).await.unwrap();

    assert_eq!(mock.calls(Method::Chat), 0);
    assert_eq!(mock.calls(Method::Chats), 0);
    assert_eq!(raised.recv().await.unwrap(), PushEvent::SessionCreated { chat_id: 1 });
  }

  #[tokio::test]
  async fn test_history_reads_oldest_first_and_grows_at_tail() {
    let mock = inbox();
    let history = MessageCollection::new(SyncContext::new(mock.clone()).with_page_size(3), 1);

    assert_eq!(ids(&history.items().await.unwrap()), vec![3, 4, 5]);
    history.load_next().await.unwrap();
    assert_eq!(ids(&history.items().await.unwrap()), vec![1, 2, 3, 4, 5]);

    mock.put(Method::Messages, message(6, 1));
    history
      .apply_event(&PushEvent::MessageReceived {
        chat_id: 1,
        message_id: 6,
      })
      .await
      .unwrap();
    assert_eq!(ids(&history.items().await.unwrap()), vec![1, 2, 3, 4, 5, 6]);

    // Other chats' messages are not ours
    history
      .apply_event(&PushEvent::MessageReceived {
        chat_id: 2,
        message_id: 7,
      })
      .await
      .unwrap();
    assert_eq!(mock.calls(Method::Message), 1);
  }
}
