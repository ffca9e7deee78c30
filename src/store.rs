use chrono::{NaiveDate, TimeZone, Utc};
use tracing::{debug, error, warn};
use uuid::Uuid;

use crate::models::{Filter, NewTask, Priority, Task, TaskPatch};
use crate::storage::{self, SlotStorage};
use crate::toast::{ToastKind, ToastQueue};
use crate::utils::{format_date, today};

/// How the last hydration filled the store
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Hydration {
    /// Saved tasks were read back
    Restored,
    /// Nothing was saved yet; the seed list was used and written out
    Seeded,
    /// Saved data could not be read; the seed list is shown but the slot is
    /// left alone until the next change
    SeededAfterCorruption,
}

/// Counters shown next to the filter list
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TaskStats {
    pub total: usize,
    pub completed: usize,
    pub pending: usize,
    pub today: usize,
    pub upcoming: usize,
}

impl TaskStats {
    /// Share of completed tasks, 0-100
    pub fn completion_percent(&self) -> u8 {
        if self.total == 0 {
            return 0;
        }
        ((self.completed * 100) / self.total) as u8
    }
}

/// Owns the task list. Every change is written through to storage and
/// reported with a toast; nothing else mutates the list.
pub struct TaskStore {
    tasks: Vec<Task>,
    filter: Filter,
    editing: Option<String>,
    hydration: Option<Hydration>,
    storage: Box<dyn SlotStorage>,
    toasts: ToastQueue,
}

impl TaskStore {
    /// An empty, not yet hydrated store. Changes made before `hydrate` are
    /// kept in memory only.
    pub fn new(storage: Box<dyn SlotStorage>, toasts: ToastQueue) -> Self {
        Self {
            tasks: Vec::new(),
            filter: Filter::default(),
            editing: None,
            hydration: None,
            storage,
            toasts,
        }
    }

    /// Create a store and hydrate it from storage
    pub fn load(storage: Box<dyn SlotStorage>, toasts: ToastQueue) -> Self {
        let mut store = Self::new(storage, toasts);
        store.hydrate();
        store
    }

    /// Replace the in-memory list with what storage holds, falling back to
    /// the seed list when there is nothing usable.
    pub fn hydrate(&mut self) -> Hydration {
        let outcome = match storage::load_tasks(self.storage.as_ref()) {
            Ok(Some(tasks)) => {
                self.tasks = tasks;
                Hydration::Restored
            }
            Ok(None) => {
                self.tasks = seed_tasks();
                Hydration::Seeded
            }
            Err(e) => {
                warn!("Saved tasks could not be read, showing defaults: {}", e);
                self.tasks = seed_tasks();
                Hydration::SeededAfterCorruption
            }
        };
        self.hydration = Some(outcome);

        if self.editing.as_deref().is_some_and(|id| self.get(id).is_none()) {
            self.editing = None;
        }
        if outcome == Hydration::Seeded {
            self.persist();
        }
        debug!(?outcome, count = self.tasks.len(), "task store hydrated");
        outcome
    }

    /// Re-read storage, picking up changes written by another process
    pub fn reload(&mut self) -> Hydration {
        self.hydrate()
    }

    pub fn hydration(&self) -> Option<Hydration> {
        self.hydration
    }

    /// Add a task with a fresh id and creation time, appended to the end
    pub fn add_task(&mut self, data: NewTask) -> Task {
        let mut id = Uuid::new_v4().to_string();
        while self.get(&id).is_some() {
            id = Uuid::new_v4().to_string();
        }
        let task = data.into_task(id, Utc::now());
        self.tasks.push(task.clone());
        self.persist();
        self.toasts.show("Task created successfully!", ToastKind::Success);
        task
    }

    /// Merge `patch` into the task with `id`. An unknown id changes nothing
    /// but is still reported as a success.
    pub fn update_task(&mut self, id: &str, patch: TaskPatch) {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => patch.apply(task),
            None => debug!(id, "update for unknown task ignored"),
        }
        self.persist();
        self.toasts.show("Task updated successfully!", ToastKind::Success);
    }

    /// Remove the task with `id`, if there is one
    pub fn delete_task(&mut self, id: &str) {
        self.tasks.retain(|t| t.id != id);
        if self.editing.as_deref() == Some(id) {
            self.editing = None;
        }
        self.persist();
        self.toasts.show("Task deleted successfully!", ToastKind::Success);
    }

    /// Flip the completion flag. Returns the new state, or None for an
    /// unknown id (in which case nothing happens).
    pub fn toggle_task(&mut self, id: &str) -> Option<bool> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            debug!(id, "toggle for unknown task ignored");
            return None;
        };
        task.completed = !task.completed;
        let completed = task.completed;
        self.persist();

        let message = if completed {
            "Task completed!"
        } else {
            "Task marked as incomplete!"
        };
        self.toasts.show(message, ToastKind::Success);
        Some(completed)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn filter(&self) -> Filter {
        self.filter
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.filter = filter;
    }

    /// Tasks matching the current filter, judged against today's local date
    pub fn filtered_tasks(&self) -> Vec<&Task> {
        self.filtered_tasks_on(today())
    }

    /// Tasks matching the current filter, in stored order
    pub fn filtered_tasks_on(&self, today: NaiveDate) -> Vec<&Task> {
        let today = format_date(today);
        self.tasks
            .iter()
            .filter(|t| self.filter.matches(t, &today))
            .collect()
    }

    pub fn stats(&self) -> TaskStats {
        self.stats_on(today())
    }

    pub fn stats_on(&self, today: NaiveDate) -> TaskStats {
        let today = format_date(today);
        let count = |filter: Filter| self.tasks.iter().filter(|t| filter.matches(t, &today)).count();
        let completed = count(Filter::Completed);
        TaskStats {
            total: self.tasks.len(),
            completed,
            pending: self.tasks.len() - completed,
            today: count(Filter::Today),
            upcoming: count(Filter::Upcoming),
        }
    }

    /// Mark a task as being edited, or clear with None. Unknown ids clear it.
    pub fn set_editing_task(&mut self, id: Option<&str>) {
        self.editing = id.filter(|id| self.get(id).is_some()).map(str::to_string);
    }

    pub fn editing_task(&self) -> Option<&Task> {
        self.editing.as_deref().and_then(|id| self.get(id))
    }

    pub fn toasts(&self) -> &ToastQueue {
        &self.toasts
    }

    fn persist(&self) {
        if self.hydration.is_none() {
            debug!("store not hydrated yet, skipping save");
            return;
        }
        if let Err(e) = storage::save_tasks(self.storage.as_ref(), &self.tasks) {
            error!("Failed to save tasks: {}", e);
        }
    }
}

/// Tasks shown on first run
pub fn seed_tasks() -> Vec<Task> {
    let seed = |id: &str,
                title: &str,
                description: &str,
                due: (&str, &str),
                priority: Priority,
                completed: bool,
                created: (i32, u32, u32),
                category: &str| Task {
        id: id.to_string(),
        title: title.to_string(),
        description: description.to_string(),
        due_date: due.0.to_string(),
        due_time: Some(due.1.to_string()),
        priority,
        category: category.to_string(),
        completed,
        created_at: Utc
            .with_ymd_and_hms(created.0, created.1, created.2, 0, 0, 0)
            .single()
            .unwrap_or_default(),
    };

    vec![
        seed(
            "1",
            "Complete project proposal",
            "Finalize the Q4 project proposal and submit to management for review and approval",
            ("2024-01-15", "14:00"),
            Priority::High,
            false,
            (2024, 1, 10),
            "Work",
        ),
        seed(
            "2",
            "Team meeting preparation",
            "Prepare agenda and materials for weekly team sync meeting",
            ("2024-01-12", "09:00"),
            Priority::Medium,
            false,
            (2024, 1, 9),
            "Meetings",
        ),
        seed(
            "3",
            "Code review session",
            "Review pull requests from team members and provide feedback",
            ("2024-01-11", "16:30"),
            Priority::High,
            true,
            (2024, 1, 8),
            "Development",
        ),
    ]
}
