//! Identity implementations for school types.

use crate::cache::Identified;

use super::types::{Chat, Lesson, Mark, Message, Person, Subject, Task};

impl Identified for Subject {
  fn id(&self) -> i64 {
    self.id
  }

  fn kind() -> &'static str {
    "subject"
  }
}

impl Identified for Mark {
  fn id(&self) -> i64 {
    self.id
  }

  fn kind() -> &'static str {
    "mark"
  }
}

impl Identified for Task {
  fn id(&self) -> i64 {
    self.id
  }

  fn kind() -> &'static str {
    "task"
  }
}

impl Identified for Lesson {
  fn id(&self) -> i64 {
    self.id
  }

  fn kind() -> &'static str {
    "lesson"
  }
}

impl Identified for Chat {
  fn id(&self) -> i64 {
    self.id
  }

  fn kind() -> &'static str {
    "chat"
  }
}

impl Identified for Message {
  fn id(&self) -> i64 {
    self.id
  }

  fn kind() -> &'static str {
    "message"
  }
}

impl Identified for Person {
  fn id(&self) -> i64 {
    self.id
  }

  fn kind() -> &'static str {
    "person"
  }
}
