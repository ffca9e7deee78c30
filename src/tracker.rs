use crate::models::{Filter, NewTask, Task, TaskPatch};
use crate::notifications::{NotificationScheduler, Permission, ReconcileSummary};
use crate::store::{Hydration, TaskStore};
use crate::toast::ToastQueue;

/// The task store together with the alarm scheduler that watches it.
///
/// Every mutation goes through here so alarms are reconciled right after
/// the list changes.
pub struct Tracker {
    store: TaskStore,
    scheduler: NotificationScheduler,
}

impl Tracker {
    pub fn new(store: TaskStore, scheduler: NotificationScheduler) -> Self {
        let mut tracker = Self { store, scheduler };
        tracker.resync();
        tracker
    }

    /// Ask for notification permission and schedule alarms for the current list
    pub fn activate_notifications(&mut self) -> Permission {
        let permission = self.scheduler.activate();
        self.resync();
        permission
    }

    pub fn add_task(&mut self, data: NewTask) -> Task {
        let task = self.store.add_task(data);
        self.resync();
        task
    }

    pub fn update_task(&mut self, id: &str, patch: TaskPatch) {
        self.store.update_task(id, patch);
        self.resync();
    }

    pub fn delete_task(&mut self, id: &str) {
        self.store.delete_task(id);
        self.resync();
    }

    pub fn toggle_task(&mut self, id: &str) -> Option<bool> {
        let completed = self.store.toggle_task(id);
        self.resync();
        completed
    }

    pub fn reload(&mut self) -> Hydration {
        let outcome = self.store.reload();
        self.resync();
        outcome
    }

    pub fn set_filter(&mut self, filter: Filter) {
        self.store.set_filter(filter);
    }

    pub fn set_editing_task(&mut self, id: Option<&str>) {
        self.store.set_editing_task(id);
    }

    /// Reconcile alarms against the current list. Also drops alarms whose
    /// due moment has passed since the last pass.
    pub fn resync(&mut self) -> ReconcileSummary {
        self.scheduler.sync(&self.store)
    }

    pub fn store(&self) -> &TaskStore {
        &self.store
    }

    pub fn scheduler(&self) -> &NotificationScheduler {
        &self.scheduler
    }

    pub fn toasts(&self) -> &ToastQueue {
        self.store.toasts()
    }

    /// Cancel alarms and pending toast timers
    pub fn shutdown(&mut self) {
        self.scheduler.cancel_all();
        self.store.toasts().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notifications::{Notification, NotificationHost};
    use crate::storage::{Database, SlotStorage, TASKS_SLOT};
    use chrono::{Duration, Local, NaiveTime};
    use std::sync::Arc;

    struct AllowAll;

    impl NotificationHost for AllowAll {
        fn request_permission(&self) -> Permission {
            Permission::Granted
        }

        fn notify(&self, _notification: &Notification) {}
    }

    fn tracker() -> Tracker {
        let db = Database::open_in_memory().unwrap();
        db.write_slot(TASKS_SLOT, "[]").unwrap();
        let store = TaskStore::load(Box::new(db), ToastQueue::new());
        let scheduler = NotificationScheduler::new(Arc::new(AllowAll), NaiveTime::from_hms_opt(9, 0, 0).unwrap());
        Tracker::new(store, scheduler)
    }

    fn due_in(hours: i64) -> NewTask {
        let due = Local::now().naive_local() + Duration::hours(hours);
        let mut draft = NewTask::new("Call back", due.format("%Y-%m-%d").to_string(), "Work");
        draft.due_time = Some(due.format("%H:%M").to_string());
        draft
    }

    #[tokio::test]
    async fn mutations_keep_alarms_in_step() {
        let mut tracker = tracker();
        assert_eq!(tracker.activate_notifications(), Permission::Granted);

        let task = tracker.add_task(due_in(1));
        assert_eq!(tracker.scheduler().pending_alarms().len(), 1);
        assert_eq!(tracker.scheduler().pending_alarms()[0].0, task.id);

        tracker.toggle_task(&task.id);
        assert!(tracker.scheduler().pending_alarms().is_empty());

        tracker.toggle_task(&task.id);
        assert_eq!(tracker.scheduler().pending_alarms().len(), 1);

        tracker.delete_task(&task.id);
        assert!(tracker.scheduler().pending_alarms().is_empty());
    }

    #[tokio::test]
    async fn past_tasks_never_get_alarms() {
        let mut tracker = tracker();
        tracker.activate_notifications();
        tracker.add_task(due_in(-3));
        assert!(tracker.scheduler().pending_alarms().is_empty());
    }

    #[tokio::test]
    async fn no_alarms_before_activation() {
        let mut tracker = tracker();
        tracker.add_task(due_in(2));
        assert!(tracker.scheduler().pending_alarms().is_empty());

        tracker.activate_notifications();
        assert_eq!(tracker.scheduler().pending_alarms().len(), 1);

        tracker.shutdown();
        assert!(tracker.scheduler().pending_alarms().is_empty());
        assert!(tracker.toasts().is_empty());
    }
}
