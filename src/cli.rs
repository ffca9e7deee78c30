use clap::{Parser, Subcommand};
use std::time::Duration;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::Config;
use crate::models::{Filter, NewTask, Priority, Task, TaskPatch, ValidationError};
use crate::notifications::Permission;
use crate::store::TaskStats;
use crate::toast::{ToastKind, ToastQueue};
use crate::tracker::Tracker;
use crate::utils::{format_due, resolve_due_date, today};

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "Personal task tracker with due-date reminders")]
#[command(version)]
pub struct Cli {
    /// Custom config file path
    #[arg(short, long)]
    pub config: Option<String>,

    /// Use development mode (uses separate dev config/storage)
    #[arg(long)]
    pub dev: bool,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Add a new task
    Add {
        /// Task title
        title: String,
        /// Due date (YYYY-MM-DD, "today" or "tomorrow")
        #[arg(long)]
        due: Option<String>,
        /// Due time (HH:MM, 24-hour)
        #[arg(long)]
        time: Option<String>,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        category: Option<String>,
        #[arg(long)]
        description: Option<String>,
    },
    /// Change fields of an existing task
    Edit {
        /// Task id or unique id prefix
        id: String,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        /// Due date (YYYY-MM-DD, "today" or "tomorrow")
        #[arg(long)]
        due: Option<String>,
        /// Due time (HH:MM, 24-hour)
        #[arg(long, conflicts_with = "clear_time")]
        time: Option<String>,
        /// Remove the due time
        #[arg(long)]
        clear_time: bool,
        #[arg(long, value_enum)]
        priority: Option<Priority>,
        #[arg(long)]
        category: Option<String>,
    },
    /// Mark a task completed, or back to incomplete
    #[command(alias = "done")]
    Toggle {
        /// Task id or unique id prefix
        id: String,
    },
    /// Delete a task
    Delete {
        /// Task id or unique id prefix
        id: String,
    },
    /// List tasks (default if no subcommand)
    List {
        #[arg(long, value_enum, default_value_t = Filter::All)]
        filter: Filter,
    },
    /// Show task counters
    Stats,
    /// Stay running and send reminders when tasks fall due
    Watch,
}

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Storage error: {0}")]
    StorageError(#[from] crate::storage::StorageError),
    #[error("{0}")]
    ValidationError(#[from] ValidationError),
    #[error("No task matches '{0}'")]
    TaskNotFound(String),
    #[error("'{0}' matches more than one task, use a longer id")]
    AmbiguousId(String),
    #[error("Nothing to change")]
    EmptyEdit,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl CliError {
    /// Whether the user has already been told through an error toast
    pub fn is_reported(&self) -> bool {
        matches!(self, CliError::ValidationError(_))
    }
}

/// Run one command against the tracker
pub async fn dispatch(command: Commands, tracker: &mut Tracker, config: &Config) -> Result<(), CliError> {
    match command {
        Commands::Add { title, due, time, priority, category, description } => {
            let mut draft = NewTask::new(
                title,
                due.map(|d| resolve_due_date(&d, today())).unwrap_or_default(),
                category.unwrap_or_else(|| config.default_category.clone()),
            );
            draft.due_time = time;
            draft.priority = priority.unwrap_or(config.default_priority);
            draft.description = description.unwrap_or_default();
            handle_add_task(draft, tracker)
        }
        Commands::Edit { id, title, description, due, time, clear_time, priority, category } => {
            let patch = TaskPatch {
                title,
                description,
                due_date: due.map(|d| resolve_due_date(&d, today())),
                due_time: if clear_time { Some(None) } else { time.map(Some) },
                priority,
                category,
                completed: None,
            };
            handle_edit_task(&id, patch, tracker)
        }
        Commands::Toggle { id } => handle_toggle_task(&id, tracker),
        Commands::Delete { id } => handle_delete_task(&id, tracker),
        Commands::List { filter } => {
            handle_list(filter, tracker);
            Ok(())
        }
        Commands::Stats => {
            print_stats(&tracker.store().stats());
            Ok(())
        }
        Commands::Watch => handle_watch(tracker, config.reload_interval()).await,
    }
}

/// Handle the add command
pub fn handle_add_task(draft: NewTask, tracker: &mut Tracker) -> Result<(), CliError> {
    if let Err(e) = draft.validate() {
        report_invalid(tracker.toasts(), &e);
        return Err(e.into());
    }
    let task = tracker.add_task(draft);
    println!("Added {}", short_id(&task.id));
    Ok(())
}

/// Handle the edit command
pub fn handle_edit_task(id: &str, patch: TaskPatch, tracker: &mut Tracker) -> Result<(), CliError> {
    if patch.is_empty() {
        return Err(CliError::EmptyEdit);
    }
    if let Err(e) = patch.validate() {
        report_invalid(tracker.toasts(), &e);
        return Err(e.into());
    }
    let id = resolve_id(tracker.store().tasks(), id)?;
    tracker.set_editing_task(Some(&id));
    tracker.update_task(&id, patch);
    tracker.set_editing_task(None);
    Ok(())
}

/// Handle the toggle command
pub fn handle_toggle_task(id: &str, tracker: &mut Tracker) -> Result<(), CliError> {
    let id = resolve_id(tracker.store().tasks(), id)?;
    tracker.toggle_task(&id);
    Ok(())
}

/// Handle the delete command
pub fn handle_delete_task(id: &str, tracker: &mut Tracker) -> Result<(), CliError> {
    let id = resolve_id(tracker.store().tasks(), id)?;
    tracker.delete_task(&id);
    Ok(())
}

pub fn handle_list(filter: Filter, tracker: &mut Tracker) {
    tracker.set_filter(filter);
    let tasks = tracker.store().filtered_tasks();
    println!("{} Tasks ({} found)", filter, tasks.len());
    if tasks.is_empty() {
        match filter {
            Filter::All => println!("No tasks yet. Add one with `taskdeck add`."),
            other => println!("No {} tasks at the moment.", other.to_string().to_lowercase()),
        }
        return;
    }
    for task in tasks {
        println!("{}", format_task_line(task));
    }
}

/// Keep reminders running until Ctrl-C, picking up changes made by other
/// invocations.
pub async fn handle_watch(tracker: &mut Tracker, reload_every: Duration) -> Result<(), CliError> {
    match tracker.activate_notifications() {
        Permission::Granted => {}
        other => warn!(?other, "reminders are unavailable, watching without alerts"),
    }
    println!(
        "Watching {} pending reminder(s), press Ctrl-C to stop",
        tracker.scheduler().pending_alarms().len()
    );

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);
    let mut ticker = tokio::time::interval(reload_every);
    // First tick completes immediately
    ticker.tick().await;

    loop {
        tokio::select! {
            result = &mut shutdown => {
                result?;
                break;
            }
            _ = ticker.tick() => {
                tracker.reload();
            }
        }
    }

    info!("stopping reminders");
    tracker.shutdown();
    Ok(())
}

/// Print and dismiss every toast currently queued
pub fn flush_toasts(toasts: &ToastQueue) {
    for toast in toasts.toasts() {
        let label = match toast.kind {
            ToastKind::Success => "ok",
            ToastKind::Error => "error",
            ToastKind::Info => "info",
            ToastKind::Warning => "warning",
        };
        println!("[{}] {}", label, toast.message);
        toasts.remove(toast.id);
    }
}

fn report_invalid(toasts: &ToastQueue, error: &ValidationError) {
    let message = if error.is_missing_field() {
        "Please fill in required fields".to_string()
    } else {
        error.to_string()
    };
    toasts.show(message, ToastKind::Error);
}

/// Find the single task whose id is `input` or starts with it
pub fn resolve_id(tasks: &[Task], input: &str) -> Result<String, CliError> {
    if let Some(task) = tasks.iter().find(|t| t.id == input) {
        return Ok(task.id.clone());
    }
    let mut matches = tasks.iter().filter(|t| t.id.starts_with(input));
    match (matches.next(), matches.next()) {
        (Some(task), None) if !input.is_empty() => Ok(task.id.clone()),
        (Some(_), Some(_)) => Err(CliError::AmbiguousId(input.to_string())),
        _ => Err(CliError::TaskNotFound(input.to_string())),
    }
}

fn short_id(id: &str) -> &str {
    id.get(..8).unwrap_or(id)
}

fn format_task_line(task: &Task) -> String {
    let mark = if task.completed { "[x]" } else { "[ ]" };
    let due = match task.due_moment(chrono::NaiveTime::default()) {
        Some(moment) if task.due_time.is_some() => format_due(moment),
        _ => task.due_date.clone(),
    };
    format!(
        "{} {:<8}  {:<22}  {:<6}  {:<12}  {}",
        mark,
        short_id(&task.id),
        due,
        task.priority,
        task.category,
        task.title
    )
}

fn print_stats(stats: &TaskStats) {
    println!("Total:     {}", stats.total);
    println!("Today:     {}", stats.today);
    println!("Upcoming:  {}", stats.upcoming);
    println!("Completed: {}", stats.completed);
    println!("Pending:   {}", stats.pending);
    println!("Progress:  {}%", stats.completion_percent());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{NotificationScheduler, TerminalNotifier};
    use crate::storage::{Database, SlotStorage, TASKS_SLOT};
    use crate::store::TaskStore;
    use chrono::{NaiveTime, Utc};
    use std::sync::Arc;

    fn tracker() -> Tracker {
        let db = Database::open_in_memory().unwrap();
        db.write_slot(TASKS_SLOT, "[]").unwrap();
        let store = TaskStore::load(Box::new(db), ToastQueue::new());
        let scheduler = NotificationScheduler::new(
            Arc::new(TerminalNotifier::new(false)),
            NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
        );
        Tracker::new(store, scheduler)
    }

    fn task_with_id(id: &str) -> Task {
        NewTask::new("t", "2024-01-15", "Work").into_task(id.to_string(), Utc::now())
    }

    #[test]
    fn resolves_exact_and_prefix_ids() {
        let tasks = vec![task_with_id("abc123"), task_with_id("abd456"), task_with_id("ab")];
        assert_eq!(resolve_id(&tasks, "ab").unwrap(), "ab");
        assert_eq!(resolve_id(&tasks, "abc").unwrap(), "abc123");
        assert!(matches!(resolve_id(&tasks, "a"), Err(CliError::AmbiguousId(_))));
        assert!(matches!(resolve_id(&tasks, "zzz"), Err(CliError::TaskNotFound(_))));
        assert!(matches!(resolve_id(&[], ""), Err(CliError::TaskNotFound(_))));
    }

    #[test]
    fn invalid_add_shows_error_toast_and_changes_nothing() {
        let mut tracker = tracker();
        let draft = NewTask::new("Needs a date", "", "Work");

        let result = handle_add_task(draft, &mut tracker);
        assert!(matches!(result, Err(CliError::ValidationError(ValidationError::MissingDueDate))));
        assert!(tracker.store().tasks().is_empty());

        let toasts = tracker.toasts().toasts();
        assert_eq!(toasts.len(), 1);
        assert_eq!(toasts[0].kind, ToastKind::Error);
        assert_eq!(toasts[0].message, "Please fill in required fields");
        assert!(result.unwrap_err().is_reported());
        assert!(!CliError::TaskNotFound("abc".into()).is_reported());
    }

    #[test]
    fn edit_applies_patch_and_clears_editing() {
        let mut tracker = tracker();
        let task = tracker.add_task(NewTask::new("Old", "2024-01-15", "Work"));
        let patch = TaskPatch { title: Some("New".into()), due_time: Some(Some("07:00".into())), ..Default::default() };

        handle_edit_task(&task.id[..6], patch, &mut tracker).unwrap();
        let edited = tracker.store().get(&task.id).unwrap();
        assert_eq!(edited.title, "New");
        assert_eq!(edited.due_time.as_deref(), Some("07:00"));
        assert!(tracker.store().editing_task().is_none());

        assert!(matches!(
            handle_edit_task(&task.id, TaskPatch::default(), &mut tracker),
            Err(CliError::EmptyEdit)
        ));
    }

    #[test]
    fn flushing_empties_the_queue() {
        let tracker = tracker();
        tracker.toasts().show("one", ToastKind::Info);
        tracker.toasts().show("two", ToastKind::Warning);
        flush_toasts(tracker.toasts());
        assert!(tracker.toasts().is_empty());
    }
}
