use chrono::{DateTime, NaiveDateTime, NaiveTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use thiserror::Error;

use crate::utils::{parse_date, parse_time};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, clap::ValueEnum)]
pub enum Priority {
    High,
    #[default]
    Medium,
    Low,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub due_date: String, // ISO 8601: YYYY-MM-DD
    #[serde(default, deserialize_with = "blank_as_none")]
    pub due_time: Option<String>, // HH:MM, 24-hour
    pub priority: Priority,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub completed: bool,
    pub created_at: DateTime<Utc>,
}

impl Task {
    /// The local wall-clock moment this task is due.
    /// Falls back to `default_time` when the task has no time of its own.
    /// Returns None when the date or time does not parse.
    pub fn due_moment(&self, default_time: NaiveTime) -> Option<NaiveDateTime> {
        let date = parse_date(&self.due_date).ok()?;
        let time = match self.due_time.as_deref() {
            Some(time) => parse_time(time).ok()?,
            None => default_time,
        };
        Some(date.and_time(time))
    }
}

// Older saves write "" for a task without a time
fn blank_as_none<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.filter(|s| !s.trim().is_empty()))
}

/// Which subset of tasks the list view shows
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum Filter {
    #[default]
    All,
    Today,
    Upcoming,
    Completed,
}

impl Filter {
    /// Check a task against this filter. `today` is an ISO date string;
    /// fixed-width zero-padded dates order correctly as plain strings.
    pub fn matches(&self, task: &Task, today: &str) -> bool {
        match self {
            Filter::All => true,
            Filter::Today => !task.completed && task.due_date.as_str() == today,
            Filter::Upcoming => !task.completed && task.due_date.as_str() > today,
            Filter::Completed => task.completed,
        }
    }
}

impl fmt::Display for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Filter::All => "All",
            Filter::Today => "Today",
            Filter::Upcoming => "Upcoming",
            Filter::Completed => "Completed",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task title is required")]
    MissingTitle,
    #[error("Due date is required")]
    MissingDueDate,
    #[error("Invalid due date '{0}', expected YYYY-MM-DD")]
    InvalidDueDate(String),
    #[error("Invalid due time '{0}', expected HH:MM")]
    InvalidDueTime(String),
}

impl ValidationError {
    /// Whether this is a required field left blank rather than a malformed value
    pub fn is_missing_field(&self) -> bool {
        matches!(self, ValidationError::MissingTitle | ValidationError::MissingDueDate)
    }
}

/// Task fields as supplied by a caller, before the store assigns an id and
/// creation timestamp.
#[derive(Debug, Clone, PartialEq)]
pub struct NewTask {
    pub title: String,
    pub description: String,
    pub due_date: String,
    pub due_time: Option<String>,
    pub priority: Priority,
    pub category: String,
    pub completed: bool,
}

impl NewTask {
    pub fn new(title: impl Into<String>, due_date: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            due_date: due_date.into(),
            due_time: None,
            priority: Priority::default(),
            category: category.into(),
            completed: false,
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingTitle);
        }
        validate_due_date(&self.due_date)?;
        if let Some(time) = &self.due_time {
            validate_due_time(time)?;
        }
        Ok(())
    }

    pub(crate) fn into_task(self, id: String, created_at: DateTime<Utc>) -> Task {
        Task {
            id,
            title: self.title,
            description: self.description,
            due_date: self.due_date,
            due_time: self.due_time,
            priority: self.priority,
            category: self.category,
            completed: self.completed,
            created_at,
        }
    }
}

/// A partial update. `None` leaves the field untouched; `due_time` uses
/// `Some(None)` to clear the time.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<String>,
    pub due_time: Option<Option<String>>,
    pub priority: Option<Priority>,
    pub category: Option<String>,
    pub completed: Option<bool>,
}

impl TaskPatch {
    pub fn is_empty(&self) -> bool {
        *self == TaskPatch::default()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if let Some(title) = &self.title
            && title.trim().is_empty()
        {
            return Err(ValidationError::MissingTitle);
        }
        if let Some(due_date) = &self.due_date {
            validate_due_date(due_date)?;
        }
        if let Some(Some(time)) = &self.due_time {
            validate_due_time(time)?;
        }
        Ok(())
    }

    /// Merge the supplied fields into `task`. Id and creation time are not
    /// part of a patch and never change.
    pub fn apply(self, task: &mut Task) {
        if let Some(title) = self.title {
            task.title = title;
        }
        if let Some(description) = self.description {
            task.description = description;
        }
        if let Some(due_date) = self.due_date {
            task.due_date = due_date;
        }
        if let Some(due_time) = self.due_time {
            task.due_time = due_time;
        }
        if let Some(priority) = self.priority {
            task.priority = priority;
        }
        if let Some(category) = self.category {
            task.category = category;
        }
        if let Some(completed) = self.completed {
            task.completed = completed;
        }
    }
}

fn validate_due_date(due_date: &str) -> Result<(), ValidationError> {
    if due_date.trim().is_empty() {
        return Err(ValidationError::MissingDueDate);
    }
    parse_date(due_date).map_err(|_| ValidationError::InvalidDueDate(due_date.to_string()))?;
    Ok(())
}

fn validate_due_time(time: &str) -> Result<(), ValidationError> {
    parse_time(time).map_err(|_| ValidationError::InvalidDueTime(time.to_string()))?;
    Ok(())
}
