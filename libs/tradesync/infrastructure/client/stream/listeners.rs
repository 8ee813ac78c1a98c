//! Per-category listener registry
//!
//! Listeners are plain closures. Registering returns a [`ListenerHandle`]
//! whose `unregister()` removes exactly that listener; calling it again is a
//! no-op. Dispatch snapshots the current listeners, releases the lock, then
//! calls each one with its panics contained.

use parking_lot::Mutex;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, Weak};
use tracing::{error, trace};

type Listener<T> = Arc<dyn Fn(&T) + Send + Sync>;

struct Entries<T> {
    next_id: u64,
    listeners: Vec<(u64, Listener<T>)>,
}

pub struct ListenerRegistry<T> {
    category: &'static str,
    entries: Arc<Mutex<Entries<T>>>,
}

impl<T: 'static> ListenerRegistry<T> {
    pub fn new(category: &'static str) -> Self {
        Self {
            category,
            entries: Arc::new(Mutex::new(Entries {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    pub fn register<F>(&self, listener: F) -> ListenerHandle
    where
        F: Fn(&T) + Send + Sync + 'static,
    {
        let id = {
            let mut entries = self.entries.lock();
            let id = entries.next_id;
            entries.next_id += 1;
            entries.listeners.push((id, Arc::new(listener)));
            id
        };
        trace!("[Listeners] Registered {} listener #{}", self.category, id);

        let entries: Weak<Mutex<Entries<T>>> = Arc::downgrade(&self.entries);
        ListenerHandle::new(move || {
            if let Some(entries) = entries.upgrade() {
                entries.lock().listeners.retain(|(entry_id, _)| *entry_id != id);
            }
        })
    }

    /// Invoke every listener registered at the time of the call.
    /// Returns how many completed without panicking.
    pub fn dispatch(&self, value: &T) -> usize {
        let snapshot: Vec<Listener<T>> = self
            .entries
            .lock()
            .listeners
            .iter()
            .map(|(_, listener)| Arc::clone(listener))
            .collect();

        let mut delivered = 0;
        for listener in snapshot {
            match catch_unwind(AssertUnwindSafe(|| listener(value))) {
                Ok(()) => delivered += 1,
                Err(panic) => {
                    error!(
                        "[Listeners] {} listener panicked: {}",
                        self.category,
                        panic_message(panic.as_ref())
                    );
                }
            }
        }
        delivered
    }

    pub fn len(&self) -> usize {
        self.entries.lock().listeners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<T> Clone for ListenerRegistry<T> {
    fn clone(&self) -> Self {
        Self {
            category: self.category,
            entries: Arc::clone(&self.entries),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message
    } else {
        "non-string panic payload"
    }
}

/// Removes one listener when `unregister()` is called
#[must_use = "keep the handle to unregister the listener later"]
pub struct ListenerHandle {
    unregister: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl ListenerHandle {
    fn new(unregister: impl FnOnce() + Send + 'static) -> Self {
        Self {
            unregister: Mutex::new(Some(Box::new(unregister))),
        }
    }

    /// Remove the listener. Idempotent.
    pub fn unregister(&self) {
        let unregister = self.unregister.lock().take();
        if let Some(unregister) = unregister {
            unregister();
        }
    }

    pub fn is_registered(&self) -> bool {
        self.unregister.lock().is_some()
    }
}

impl std::fmt::Debug for ListenerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ListenerHandle")
            .field("registered", &self.is_registered())
            .finish()
    }
}
