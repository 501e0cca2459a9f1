//! Listener bookkeeping shared by backend adapters

use std::sync::{Arc, Mutex, PoisonError, Weak};

use crate::domain::Identity;
use crate::ports::{ListenerGuard, StateListener};

/// One registration; `active` is held for the duration of each call
struct ListenerSlot {
    active: Mutex<bool>,
    listener: StateListener,
}

impl ListenerSlot {
    fn call(&self, user: Option<Identity>) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if *active {
            (self.listener)(user);
        }
    }

    /// Blocks until an in-flight call on another thread returns
    fn deactivate(&self) {
        *self.active.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

#[derive(Default)]
struct RegistryInner {
    next_id: u64,
    listeners: Vec<(u64, Arc<ListenerSlot>)>,
}

/// Ordered set of state-change listeners
///
/// Listeners are called in registration order. Emission snapshots the list
/// and calls outside the registry lock, so a listener may register or
/// release others. A listener must not release its own guard from inside
/// its callback.
#[derive(Default)]
pub struct ListenerRegistry {
    inner: Arc<Mutex<RegistryInner>>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, listener: StateListener) -> ListenerGuard {
        let slot = Arc::new(ListenerSlot {
            active: Mutex::new(true),
            listener,
        });
        let id = {
            let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            let id = inner.next_id;
            inner.next_id += 1;
            inner.listeners.push((id, Arc::clone(&slot)));
            id
        };

        let weak: Weak<Mutex<RegistryInner>> = Arc::downgrade(&self.inner);
        ListenerGuard::new(move || {
            slot.deactivate();
            if let Some(inner) = weak.upgrade() {
                let mut inner = inner.lock().unwrap_or_else(PoisonError::into_inner);
                inner.listeners.retain(|(existing, _)| *existing != id);
            }
        })
    }

    pub fn emit(&self, user: Option<&Identity>) {
        let snapshot: Vec<Arc<ListenerSlot>> = {
            let inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            inner.listeners.iter().map(|(_, slot)| Arc::clone(slot)).collect()
        };
        for slot in snapshot {
            slot.call(user.cloned());
        }
    }

    pub fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .listeners
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
