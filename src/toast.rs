//! Short-lived user-facing messages.
//!
//! A [`ToastQueue`] keeps toasts in arrival order and removes each one after
//! its duration. Any component holding a clone of the queue can show or
//! dismiss toasts; a UI subscribes to [`ToastEvent`]s to render them.

use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::debug;

pub const DEFAULT_TOAST_DURATION: Duration = Duration::from_millis(3000);

const EVENT_CAPACITY: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastKind {
    Success,
    Error,
    Info,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub id: u64,
    pub message: String,
    pub kind: ToastKind,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToastEvent {
    Shown(Toast),
    Removed(u64),
}

struct Entry {
    toast: Toast,
    expiry: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct Inner {
    entries: Vec<Entry>,
    next_id: u64,
}

impl Inner {
    fn take(&mut self, id: u64) -> Option<Entry> {
        let index = self.entries.iter().position(|e| e.toast.id == id)?;
        Some(self.entries.remove(index))
    }
}

#[derive(Clone)]
pub struct ToastQueue {
    inner: Arc<Mutex<Inner>>,
    events: broadcast::Sender<ToastEvent>,
    default_duration: Duration,
}

impl Default for ToastQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl ToastQueue {
    pub fn new() -> Self {
        Self::with_default_duration(DEFAULT_TOAST_DURATION)
    }

    pub fn with_default_duration(default_duration: Duration) -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            events,
            default_duration,
        }
    }

    /// Show a toast for the queue's default duration
    pub fn show(&self, message: impl Into<String>, kind: ToastKind) -> u64 {
        self.show_for(message, kind, self.default_duration)
    }

    /// Append a toast and arrange its removal after `duration`.
    ///
    /// Expiry needs a tokio runtime; without one the toast stays until it
    /// is removed by hand.
    pub fn show_for(&self, message: impl Into<String>, kind: ToastKind, duration: Duration) -> u64 {
        let toast = {
            let mut inner = self.lock();
            inner.next_id += 1;
            let toast = Toast {
                id: inner.next_id,
                message: message.into(),
                kind,
                duration,
            };
            inner.entries.push(Entry { toast: toast.clone(), expiry: None });
            toast
        };
        let id = toast.id;
        let _ = self.events.send(ToastEvent::Shown(toast));

        match tokio::runtime::Handle::try_current() {
            Ok(runtime) => {
                let expiry = runtime.spawn(expire_after(
                    Arc::downgrade(&self.inner),
                    self.events.clone(),
                    id,
                    duration,
                ));
                let mut inner = self.lock();
                match inner.entries.iter_mut().find(|e| e.toast.id == id) {
                    Some(entry) => entry.expiry = Some(expiry),
                    // Already dismissed
                    None => expiry.abort(),
                }
            }
            Err(_) => debug!(id, "no runtime, toast will not expire on its own"),
        }

        id
    }

    /// Dismiss a toast. Safe to call for a toast that already expired or was
    /// dismissed; returns whether anything was removed.
    pub fn remove(&self, id: u64) -> bool {
        let entry = self.lock().take(id);
        let Some(entry) = entry else {
            return false;
        };
        if let Some(expiry) = entry.expiry {
            expiry.abort();
        }
        let _ = self.events.send(ToastEvent::Removed(id));
        true
    }

    /// Current toasts, oldest first
    pub fn toasts(&self) -> Vec<Toast> {
        self.lock().entries.iter().map(|e| e.toast.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every toast and cancel all pending expiry timers
    pub fn clear(&self) {
        let entries = std::mem::take(&mut self.lock().entries);
        for entry in entries {
            if let Some(expiry) = entry.expiry {
                expiry.abort();
            }
            let _ = self.events.send(ToastEvent::Removed(entry.toast.id));
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ToastEvent> {
        self.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn expire_after(
    inner: Weak<Mutex<Inner>>,
    events: broadcast::Sender<ToastEvent>,
    id: u64,
    duration: Duration,
) {
    tokio::time::sleep(duration).await;
    let Some(inner) = inner.upgrade() else {
        return;
    };
    let removed = inner
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .take(id)
        .is_some();
    if removed {
        debug!(id, "toast expired");
        let _ = events.send(ToastEvent::Removed(id));
    }
}
