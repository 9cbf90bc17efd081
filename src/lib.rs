//! Client-side incremental cache for a school records service.
//!
//! Collections of subjects, marks, tasks, lessons, chats and people hydrate
//! lazily from a paginated remote and stay current by applying push events
//! in place. See [`cache`] for the components and [`router::PushRouter`] for
//! wiring push events to them.

pub mod cache;
pub mod config;
pub mod error;
pub mod event;
pub mod logging;
pub mod remote;
pub mod router;
pub mod school;

pub use error::{Error, Result};
