use chrono::{Duration, Local, NaiveDate};
use clap::{Parser, Subcommand};
use color_eyre::{eyre::eyre, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use edusync::cache::{
  self, ChatCollection, MessageCollection, ScopeKey, SqliteStorage, SubjectCollection,
  TaskCollection, TimetableCache,
};
use edusync::config::Config;
use edusync::event::PushEvent;
use edusync::remote::{HttpRemote, OfflineRemote, Remote, SyncContext};
use edusync::router::PushRouter;
use edusync::school::{TaskStatus, ALL_SUBJECTS};

#[derive(Parser, Debug)]
#[command(name = "edusync")]
#[command(about = "Browse school records through the incremental cache")]
#[command(version)]
struct Args {
  /// Path to config file (default: $XDG_CONFIG_HOME/edusync/config.yaml)
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Serve recorded responses when the server is unreachable
  #[arg(long)]
  offline: bool,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
  /// List subjects with their averages
  Subjects,
  /// Show the marks and average for a subject (0 for all subjects)
  Marks {
    #[arg(short, long, default_value_t = ALL_SUBJECTS)]
    subject: i64,
  },
  /// List tasks
  Tasks {
    #[arg(short, long, default_value_t = ALL_SUBJECTS)]
    subject: i64,
    /// pending, completed or overdue
    #[arg(long)]
    status: Option<TaskStatus>,
    /// Pages to load
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
  },
  /// Show lessons for a day
  Timetable {
    /// Day to show (default: today)
    #[arg(short, long)]
    date: Option<NaiveDate>,
    /// Also show the following days
    #[arg(long, default_value_t = 0)]
    days: u32,
    #[arg(long)]
    class: Option<i64>,
  },
  /// Search the people directory by name prefix
  People {
    filter: Option<String>,
    #[arg(long)]
    class: Option<i64>,
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
  },
  /// List chat sessions
  Chats { filter: Option<String> },
  /// Show a chat's history
  Messages {
    chat: i64,
    #[arg(short, long, default_value_t = 1)]
    pages: usize,
  },
  /// Apply push events from a JSON-lines file to freshly loaded caches
  Replay { file: PathBuf },
}

#[tokio::main]
async fn main() -> Result<()> {
  color_eyre::install()?;

  let args = Args::parse();

  let mut config = Config::load(args.config.as_deref())?;
  if args.offline {
    config.cache.offline = true;
  }

  let _guard = edusync::logging::init(&config.log)?;
  info!(server = %config.server.url, offline = config.cache.offline, "starting");

  let ctx = SyncContext::new(build_remote(&config)?).with_page_size(config.page_size);

  // Ctrl-C aborts whatever fetch is in flight
  let cancel_ctx = ctx.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      cancel_ctx.cancel();
    }
  });

  run(args.command, &config, ctx).await
}

fn build_remote(config: &Config) -> Result<Arc<dyn Remote>> {
  let http = HttpRemote::new(&config.server.url, Config::get_api_token())?;
  if !config.cache.offline {
    return Ok(Arc::new(http));
  }

  let storage = match &config.cache.path {
    Some(path) => SqliteStorage::open(path)?,
    None => SqliteStorage::open_default()?,
  };
  let remote =
    OfflineRemote::new(http, storage).with_max_age(Duration::minutes(config.cache.stale_minutes));
  Ok(Arc::new(remote))
}

async fn run(command: Command, config: &Config, ctx: SyncContext) -> Result<()> {
  let student_id = config.server.student_id;

  match command {
    Command::Subjects => {
      let subjects = SubjectCollection::new(ctx, student_id);
      for node in subjects.items().await? {
        let average = node.grades().average().await?;
        println!("{:>5}  {:<32} {}", node.id(), node.subject().name, average);
      }
    }

    Command::Marks { subject } => {
      let subjects = SubjectCollection::new(ctx, student_id);
      let grades = subjects.get_by_id(subject).await?.grades();
      for mark in grades.get_marks().await? {
        println!(
          "{}  {:<3} {:<12} {}",
          mark.timestamp.format("%Y-%m-%d"),
          mark.value,
          mark.category,
          mark.description
        );
      }
      let summary = grades.summary().await?;
      println!("average: {}", summary.average);
      if let Some(final_mark) = summary.final_mark {
        println!("final: {}", final_mark);
      }
    }

    Command::Tasks {
      subject,
      status,
      pages,
    } => {
      let tasks = TaskCollection::for_subject(ctx, subject, Some(student_id));
      tasks.set_status(status).await?;
      tasks.load_pages(pages).await?;
      let now = chrono::Utc::now();
      for task in tasks.items().await? {
        let due = task.expires_at().with_timezone(&Local).format("%Y-%m-%d");
        println!("{:>6}  {:<9} due {}  {}", task.id, task.status(now).as_str(), due, task.content);
      }
    }

    Command::Timetable { date, days, class } => {
      let class_id = class
        .or(config.timetable.class_id)
        .ok_or_else(|| eyre!("No class given. Pass --class or set timetable.class_id"))?;
      let scope = ScopeKey::new().with_class(class_id).with_student(student_id);
      let timetable = TimetableCache::new(ctx, scope, config.timetable.window_days);

      let first = date.unwrap_or_else(|| Local::now().date_naive());
      for day in first.iter_days().take(days as usize + 1) {
        println!("{}", day.format("%A %Y-%m-%d"));
        for lesson in timetable.get_by_date(day).await? {
          let gap = lesson
            .break_after
            .map(|m| format!("  (+{} min)", m))
            .unwrap_or_default();
          println!(
            "  {}-{}  {:<24} {}{}",
            lesson.starts_at.format("%H:%M"),
            lesson.ends_at.format("%H:%M"),
            lesson.subject_name,
            lesson.room.as_deref().unwrap_or(""),
            gap
          );
        }
      }
    }

    Command::People {
      filter,
      class,
      pages,
    } => {
      let people = cache::people(ctx, class);
      if let Some(filter) = filter {
        people.set_filter(filter).await?;
      }
      people.load_pages(pages).await?;
      for person in people.items().await? {
        println!("{:>6}  {}", person.id, person.display_name);
      }
    }

    Command::Chats { filter } => {
      let chats = ChatCollection::new(ctx);
      if let Some(filter) = filter {
        chats.set_filter(filter).await?;
      }
      for chat in chats.items().await? {
        let presence = if chat.online { "*" } else { " " };
        println!(
          "{:>6} {} {:<32} {}",
          chat.id,
          presence,
          chat.title,
          chat.last_message.as_deref().unwrap_or("")
        );
      }
    }

    Command::Messages { chat, pages } => {
      let history = MessageCollection::new(ctx, chat);
      history.load_pages(pages).await?;
      for message in history.items().await? {
        println!(
          "{}  [{}] {}",
          message.sent_at.with_timezone(&Local).format("%Y-%m-%d %H:%M"),
          message.sender_id,
          message.text
        );
      }
    }

    Command::Replay { file } => replay(&file, ctx, student_id).await?,
  }

  Ok(())
}

/// Load the all-subjects caches and the chat list, then feed every event in
/// `file` through the router.
async fn replay(file: &Path, ctx: SyncContext, student_id: i64) -> Result<()> {
  let subjects = Arc::new(SubjectCollection::new(ctx.clone(), student_id));
  let all = subjects.all_subjects().await?;
  all.grades().summary().await?;
  all.tasks().len().await?;
  let chats = Arc::new(ChatCollection::new(ctx));
  chats.len().await?;

  let mut router = PushRouter::new();
  router.register_subjects(subjects.clone());
  router.register_chats(chats.clone());

  let handle = tokio::fs::File::open(file)
    .await
    .map_err(|e| eyre!("Failed to open {}: {}", file.display(), e))?;
  let mut lines = BufReader::new(handle).lines();

  let (mut applied, mut skipped) = (0usize, 0usize);
  let mut line_no = 0usize;
  while let Some(line) = lines.next_line().await? {
    line_no += 1;
    if line.trim().is_empty() {
      continue;
    }
    let event: PushEvent = match serde_json::from_str(&line) {
      Ok(event) => event,
      Err(e) => {
        warn!(line = line_no, error = %e, "skipping malformed event");
        skipped += 1;
        continue;
      }
    };
    if router.dispatch(&event).await? {
      applied += 1;
    } else {
      skipped += 1;
    }
  }

  println!("applied {} events, skipped {}", applied, skipped);
  println!("average (all subjects): {}", all.grades().average().await?);
  println!("tasks (all subjects): {}", all.tasks().len().await?);
  println!("chats: {}", chats.len().await?);
  Ok(())
}
