//! Incremental entity cache.
//!
//! Collections hydrate lazily from the remote, page in further data on
//! demand and apply push events in place:
//! - `Deferred` memoizes an async value on first access
//! - `PagedCollection` is the offset-paginated list every collection builds on
//! - scoped, task and chat collections add a query dimension to it
//! - `GradeAggregate` keeps a server-computed average next to its marks
//! - `SubjectCollection` fans push events out to materialized children
//! - `TimetableCache` fetches lessons a window of days at a time

pub mod chats;
mod deferred;
pub mod grades;
pub mod paged;
pub mod scoped;
pub mod storage;
pub mod subjects;
pub mod tasks;
pub mod timetable;
mod traits;

pub use chats::{ChatCollection, MessageCollection};
pub use deferred::Deferred;
pub use grades::{GradeAggregate, GradeScope, GradeUpdate, MarkChange};
pub use paged::{ListRoute, PagedCollection, Route};
pub use scoped::{people, ScopedCollection};
pub use storage::{MirrorStorage, NoopStorage, SqliteStorage};
pub use subjects::{SubjectCollection, SubjectNode};
pub use tasks::TaskCollection;
pub use timetable::TimetableCache;
pub use traits::{Cursor, EventSink, Identified, Order, ScopeKey};
