//! Due-date alarms.
//!
//! The scheduler keeps at most one pending alarm per task. After every change
//! to the task list it is handed the new list and reconciles: alarms whose
//! task is gone, completed or changed are cancelled, and missing ones are
//! spawned for moments still ahead. Alarms live only as long as the process.

use chrono::{Local, NaiveDateTime, NaiveTime, TimeZone};
use std::collections::HashMap;
use std::io::{IsTerminal, Write};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::Task;
use crate::store::TaskStore;
use crate::utils::format_due;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    Granted,
    Denied,
    Unsupported,
}

/// An alert handed to the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub task_id: String,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn for_task(task: &Task, due: NaiveDateTime) -> Self {
        Self {
            task_id: task.id.clone(),
            title: task.title.clone(),
            body: format!("Due: {}\nPriority: {}", format_due(due), task.priority),
        }
    }
}

/// The system facility that actually shows alerts
pub trait NotificationHost: Send + Sync {
    fn request_permission(&self) -> Permission;
    fn notify(&self, notification: &Notification);
}

/// Rings the terminal bell and prints the alert to stdout
#[derive(Debug, Clone, Copy)]
pub struct TerminalNotifier {
    enabled: bool,
}

impl TerminalNotifier {
    pub fn new(enabled: bool) -> Self {
        Self { enabled }
    }
}

impl NotificationHost for TerminalNotifier {
    fn request_permission(&self) -> Permission {
        if !self.enabled {
            Permission::Denied
        } else if std::io::stdout().is_terminal() {
            Permission::Granted
        } else {
            Permission::Unsupported
        }
    }

    fn notify(&self, notification: &Notification) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "\x07[reminder] {}", notification.title);
        for line in notification.body.lines() {
            let _ = writeln!(out, "    {}", line);
        }
        let _ = out.flush();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlarmState {
    Pending,
    Fired,
}

struct Alarm {
    fire_at: NaiveDateTime,
    notification: Notification,
    handle: JoinHandle<()>,
}

/// What a reconcile pass changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileSummary {
    pub scheduled: usize,
    pub cancelled: usize,
    pub kept: usize,
}

pub struct NotificationScheduler {
    host: Arc<dyn NotificationHost>,
    permission: Option<Permission>,
    default_due_time: NaiveTime,
    alarms: HashMap<String, Alarm>,
}

impl NotificationScheduler {
    pub fn new(host: Arc<dyn NotificationHost>, default_due_time: NaiveTime) -> Self {
        Self {
            host,
            permission: None,
            default_due_time,
            alarms: HashMap::new(),
        }
    }

    /// Ask the host for permission. Only the first call asks; later calls
    /// return the remembered answer.
    pub fn activate(&mut self) -> Permission {
        if let Some(permission) = self.permission {
            return permission;
        }
        let permission = self.host.request_permission();
        match permission {
            Permission::Granted => info!("notifications enabled"),
            other => info!(?other, "notifications unavailable, alarms disabled"),
        }
        self.permission = Some(permission);
        permission
    }

    pub fn is_active(&self) -> bool {
        self.permission == Some(Permission::Granted)
    }

    /// Reconcile against the store's current list
    pub fn sync(&mut self, store: &TaskStore) -> ReconcileSummary {
        self.reconcile(store.tasks())
    }

    pub fn reconcile(&mut self, tasks: &[Task]) -> ReconcileSummary {
        self.reconcile_at(tasks, Local::now().naive_local())
    }

    /// Bring pending alarms in line with `tasks` as of `now`.
    ///
    /// Every incomplete task whose due moment parses and lies strictly after
    /// `now` ends up with exactly one pending alarm. An existing alarm for an
    /// unchanged task is kept even once its moment has passed, so it still
    /// goes off (or, if it already went off, is not armed again). Anything
    /// else is cancelled.
    pub fn reconcile_at(&mut self, tasks: &[Task], now: NaiveDateTime) -> ReconcileSummary {
        let mut summary = ReconcileSummary::default();
        if !self.is_active() {
            summary.cancelled = self.cancel_all();
            return summary;
        }

        let mut wanted: HashMap<&str, (NaiveDateTime, Notification)> = HashMap::new();
        for task in tasks.iter().filter(|t| !t.completed) {
            let Some(due) = task.due_moment(self.default_due_time) else {
                continue;
            };
            wanted.insert(task.id.as_str(), (due, Notification::for_task(task, due)));
        }

        self.alarms.retain(|id, alarm| {
            let unchanged = wanted.get(id.as_str()).is_some_and(|(due, notification)| {
                *due == alarm.fire_at && *notification == alarm.notification
            });
            if unchanged {
                summary.kept += 1;
            } else if !alarm.handle.is_finished() {
                alarm.handle.abort();
                summary.cancelled += 1;
            }
            unchanged
        });

        for (id, (due, notification)) in wanted {
            if due <= now || self.alarms.contains_key(id) {
                continue;
            }
            if let Some(alarm) = self.spawn_alarm(due, notification, now) {
                self.alarms.insert(id.to_string(), alarm);
                summary.scheduled += 1;
            }
        }

        debug!(?summary, pending = self.alarms.len(), "alarms reconciled");
        summary
    }

    fn spawn_alarm(
        &self,
        fire_at: NaiveDateTime,
        notification: Notification,
        now: NaiveDateTime,
    ) -> Option<Alarm> {
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            warn!("no async runtime, cannot schedule alarm for {}", notification.task_id);
            return None;
        };
        let delay = alarm_delay(now, fire_at)?;
        let host = Arc::clone(&self.host);
        let payload = notification.clone();
        let handle = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(task_id = %payload.task_id, "alarm fired");
            host.notify(&payload);
        });
        debug!(task_id = %notification.task_id, %fire_at, "alarm scheduled");
        Some(Alarm { fire_at, notification, handle })
    }

    /// Pending alarms as (task id, fire time), soonest first
    pub fn pending_alarms(&self) -> Vec<(String, NaiveDateTime)> {
        let mut pending: Vec<(String, NaiveDateTime)> = self
            .alarms
            .iter()
            .filter(|(_, alarm)| !alarm.handle.is_finished())
            .map(|(id, alarm)| (id.clone(), alarm.fire_at))
            .collect();
        pending.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
        pending
    }

    pub fn alarm_state(&self, task_id: &str) -> Option<AlarmState> {
        self.alarms.get(task_id).map(|alarm| {
            if alarm.handle.is_finished() {
                AlarmState::Fired
            } else {
                AlarmState::Pending
            }
        })
    }

    /// Cancel every pending alarm. Returns how many were still pending.
    pub fn cancel_all(&mut self) -> usize {
        let mut cancelled = 0;
        for (_, alarm) in self.alarms.drain() {
            if !alarm.handle.is_finished() {
                alarm.handle.abort();
                cancelled += 1;
            }
        }
        cancelled
    }
}

/// Real time between two local wall-clock moments, so a DST change in
/// between is accounted for. A moment that falls in a DST gap is taken at
/// face value. None when `to` is not after `from`.
fn alarm_delay(from: NaiveDateTime, to: NaiveDateTime) -> Option<Duration> {
    let elapsed = match (
        Local.from_local_datetime(&from).earliest(),
        Local.from_local_datetime(&to).earliest(),
    ) {
        (Some(from), Some(to)) => to - from,
        _ => to - from,
    };
    elapsed.to_std().ok().filter(|delay| !delay.is_zero())
}

impl Drop for NotificationScheduler {
    fn drop(&mut self) {
        self.cancel_all();
    }
}
