//! Domain types for the school records service.

mod cache;
pub mod types;

pub use types::{
  Chat, GradeSummary, Lesson, Mark, Message, Person, Subject, Task, TaskStatus, ALL_SUBJECTS,
};
