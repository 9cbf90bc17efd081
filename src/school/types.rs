use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};

/// Id of the synthetic node aggregating every real subject.
pub const ALL_SUBJECTS: i64 = 0;

/// How long an undated task stays open after release.
pub const DEFAULT_TASK_LIFETIME_DAYS: i64 = 14;

/// A school subject
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subject {
  pub id: i64,
  pub name: String,
}

impl Subject {
  pub fn all() -> Self {
    Self {
      id: ALL_SUBJECTS,
      name: "All subjects".to_string(),
    }
  }

  pub fn is_all(&self) -> bool {
    self.id == ALL_SUBJECTS
  }
}

/// A single mark
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Mark {
  pub id: i64,
  pub subject_id: i64,
  pub value: String,
  pub timestamp: DateTime<Utc>,
  #[serde(default)]
  pub comment: Option<String>,
  #[serde(default)]
  pub description: String,
  #[serde(default)]
  pub category: String,
}

/// Server-computed average, plus the final mark once one is set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GradeSummary {
  pub average: String,
  #[serde(default, rename = "final")]
  pub final_mark: Option<String>,
}

/// Completion state of a task relative to now
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
  Pending,
  Completed,
  Overdue,
}

impl TaskStatus {
  pub fn as_str(&self) -> &'static str {
    match self {
      Self::Pending => "pending",
      Self::Completed => "completed",
      Self::Overdue => "overdue",
    }
  }
}

impl std::str::FromStr for TaskStatus {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s.to_lowercase().as_str() {
      "pending" => Ok(Self::Pending),
      "completed" | "done" => Ok(Self::Completed),
      "overdue" | "expired" => Ok(Self::Overdue),
      other => Err(format!("unknown task status: {}", other)),
    }
  }
}

/// An assignment
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
  pub id: i64,
  pub subject_id: i64,
  pub released_at: DateTime<Utc>,
  #[serde(default)]
  pub deadline: Option<DateTime<Utc>>,
  pub content: String,
  /// Whether the viewer has marked it done
  #[serde(default)]
  pub completed: bool,
}

impl Task {
  pub fn expires_at(&self) -> DateTime<Utc> {
    self
      .deadline
      .unwrap_or(self.released_at + Duration::days(DEFAULT_TASK_LIFETIME_DAYS))
  }

  pub fn status(&self, now: DateTime<Utc>) -> TaskStatus {
    if self.completed {
      TaskStatus::Completed
    } else if now > self.expires_at() {
      TaskStatus::Overdue
    } else {
      TaskStatus::Pending
    }
  }
}

/// One timetable entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lesson {
  pub id: i64,
  pub date: NaiveDate,
  pub starts_at: NaiveTime,
  pub ends_at: NaiveTime,
  pub subject_id: i64,
  pub subject_name: String,
  #[serde(default)]
  pub room: Option<String>,
  /// Minutes until the next lesson on the same day
  #[serde(skip)]
  pub break_after: Option<i64>,
}

/// A chat session with one interlocutor
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chat {
  pub id: i64,
  pub interlocutor_id: i64,
  pub title: String,
  #[serde(default)]
  pub photo: Option<String>,
  #[serde(default)]
  pub online: bool,
  #[serde(default)]
  pub last_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub id: i64,
  pub chat_id: i64,
  pub sender_id: i64,
  pub text: String,
  pub sent_at: DateTime<Utc>,
}

/// Directory entry for a student or staff member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Person {
  pub id: i64,
  pub display_name: String,
  #[serde(default)]
  pub class_id: Option<i64>,
}
