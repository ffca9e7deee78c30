pub mod cli;
pub mod config;
pub mod models;
pub mod notifications;
pub mod storage;
pub mod store;
pub mod toast;
pub mod tracker;
pub mod utils;

pub use config::Config;
pub use models::{Filter, NewTask, Priority, Task, TaskPatch};
pub use notifications::{NotificationHost, NotificationScheduler, Permission, TerminalNotifier};
pub use storage::{Database, SlotStorage};
pub use store::TaskStore;
pub use toast::{Toast, ToastKind, ToastQueue};
pub use tracker::Tracker;
pub use utils::Profile;
