//! Per-resource observer registry.
//!
//! Each shareable resource owns an [`ObserverList`] of the descriptor-set
//! dirty flags currently interested in it. Mutating the resource (resize)
//! notifies the list, re-dirtying every referencing set so its next
//! `update` rewrites the native entry. Registrations are weak; a dropped
//! descriptor set just disappears from the list on the next notify.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct ObserverList {
    observers: Mutex<Vec<Weak<AtomicBool>>>,
}

impl ObserverList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest. Idempotent per flag.
    pub fn connect(&self, dirty: &Arc<AtomicBool>) {
        let mut observers = self.observers.lock();
        if observers
            .iter()
            .any(|w| w.as_ptr() == Arc::as_ptr(dirty))
        {
            return;
        }
        observers.push(Arc::downgrade(dirty));
    }

    /// Remove interest. A flag never connected is a no-op.
    pub fn disengage(&self, dirty: &Arc<AtomicBool>) {
        self.observers
            .lock()
            .retain(|w| w.as_ptr() != Arc::as_ptr(dirty));
    }

    /// Set every live observer dirty and prune dead ones.
    pub fn notify(&self) {
        self.observers.lock().retain(|w| match w.upgrade() {
            Some(flag) => {
                flag.store(true, Ordering::Release);
                true
            }
            None => false,
        });
    }

    /// Live observer count (prunes dead registrations).
    pub fn observer_count(&self) -> usize {
        let mut observers = self.observers.lock();
        observers.retain(|w| w.strong_count() > 0);
        observers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn notify_sets_connected_flags() {
        let list = ObserverList::new();
        let a = Arc::new(AtomicBool::new(false));
        let b = Arc::new(AtomicBool::new(false));
        list.connect(&a);
        list.connect(&a);
        list.connect(&b);
        assert_eq!(list.observer_count(), 2);

        list.disengage(&b);
        list.notify();
        assert!(a.load(Ordering::Acquire));
        assert!(!b.load(Ordering::Acquire));
    }

    #[test]
    fn dropped_observers_are_pruned() {
        let list = ObserverList::new();
        let a = Arc::new(AtomicBool::new(false));
        list.connect(&a);
        drop(a);
        list.notify();
        assert_eq!(list.observer_count(), 0);
    }
}
