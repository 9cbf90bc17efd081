//! Timetable cache keyed by calendar date.
//!
//! A miss fetches a whole window of days around the requested date in a
//! single remote call, so browsing nearby days is served locally. Days the
//! server returns nothing for are stored as empty, and a stored day is never
//! fetched again.

use chrono::{Days, NaiveDate};
use std::collections::BTreeMap;
use tokio::sync::Mutex;
use tracing::debug;

use super::traits::ScopeKey;
use crate::error::{Error, Result};
use crate::remote::{Method, SyncContext};
use crate::school::Lesson;

pub const DEFAULT_WINDOW_DAYS: u32 = 7;

pub struct TimetableCache {
  ctx: SyncContext,
  scope: ScopeKey,
  window_days: u32,
  days: Mutex<BTreeMap<NaiveDate, Vec<Lesson>>>,
}

impl TimetableCache {
  /// `scope` selects whose timetable (class and/or student); its window is
  /// managed by the cache.
  pub fn new(ctx: SyncContext, scope: ScopeKey, window_days: u32) -> Self {
    Self {
      ctx,
      scope: ScopeKey {
        window: None,
        ..scope
      },
      window_days: window_days.max(1),
      days: Mutex::new(BTreeMap::new()),
    }
  }

  pub fn for_class(ctx: SyncContext, class_id: i64) -> Self {
    Self::new(ctx, ScopeKey::new().with_class(class_id), DEFAULT_WINDOW_DAYS)
  }

  pub fn window_days(&self) -> u32 {
    self.window_days
  }

  /// The inclusive window fetched for a miss on `date`.
  pub fn window_around(&self, date: NaiveDate) -> Result<(NaiveDate, NaiveDate)> {
    let before = Days::new(u64::from(self.window_days / 2));
    let span = Days::new(u64::from(self.window_days - 1));
    date
      .checked_sub_days(before)
      .and_then(|from| Some((from, from.checked_add_days(span)?)))
      .ok_or_else(|| {
        Error::InvalidOperation(format!(
          "a {}-day window around {} is out of the calendar range",
          self.window_days, date
        ))
      })
  }

  /// Lessons on `date`, ordered by start time.
  pub async fn get_by_date(&self, date: NaiveDate) -> Result<Vec<Lesson>> {
    let mut days = self.days.lock().await;
    if let Some(lessons) = days.get(&date) {
      return Ok(lessons.clone());
    }

    let (from, to) = self.window_around(date)?;
    let missing: Vec<NaiveDate> = from
      .iter_days()
      .take_while(|d| *d <= to)
      .filter(|d| !days.contains_key(d))
      .collect();
    // `date` itself is missing, so the span is never empty
    let (first, last) = match (missing.first(), missing.last()) {
      (Some(first), Some(last)) => (*first, *last),
      _ => (date, date),
    };

    let scope = self.scope.clone().with_window(first, last);
    let lessons: Vec<Lesson> = self.ctx.all(Method::Timetable, &scope).await?;
    debug!(%first, %last, lessons = lessons.len(), "fetched timetable window");

    let mut fetched: BTreeMap<NaiveDate, Vec<Lesson>> =
      missing.iter().map(|d| (*d, Vec::new())).collect();
    for lesson in lessons {
      if let Some(day) = fetched.get_mut(&lesson.date) {
        day.push(lesson);
      }
    }
    for (day, mut lessons) in fetched {
      compute_breaks(&mut lessons);
      days.entry(day).or_insert(lessons);
    }

    Ok(days.get(&date).cloned().unwrap_or_default())
  }

  pub async fn is_cached(&self, date: NaiveDate) -> bool {
    self.days.lock().await.contains_key(&date)
  }

  /// Dates currently present, ascending.
  pub async fn cached_dates(&self) -> Vec<NaiveDate> {
    self.days.lock().await.keys().copied().collect()
  }
}

/// Sort a day's lessons and fill in the gap before each next lesson.
pub fn compute_breaks(lessons: &mut [Lesson]) {
  lessons.sort_by_key(|l| (l.starts_at, l.id));
  let next_starts: Vec<_> = lessons.iter().skip(1).map(|l| l.starts_at).collect();
  for (i, lesson) in lessons.iter_mut().enumerate() {
    lesson.break_after = next_starts
      .get(i)
      .map(|next| (*next - lesson.ends_at).num_minutes());
  }
}
