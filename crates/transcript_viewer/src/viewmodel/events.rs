//! Change-notification registry backing the view-model.
//!
//! Publishers hand out a [`SubscriptionId`] per listener; every subscribe is
//! paired with an unsubscribe so a removed publisher stops influencing its
//! observers. Emission is synchronous and in subscription order.

use std::fmt;

pub type SubscriptionId = u64;

type Listener<E> = Box<dyn Fn(&E) + Send + Sync>;

/// Ordered listener registry for one event type.
pub struct ChangeNotifier<E> {
    listeners: Vec<(SubscriptionId, Listener<E>)>,
    next_id: SubscriptionId,
}

impl<E> ChangeNotifier<E> {
    pub fn new() -> Self {
        Self {
            listeners: Vec::new(),
            next_id: 0,
        }
    }

    pub fn subscribe(&mut self, listener: impl Fn(&E) + Send + Sync + 'static) -> SubscriptionId {
        let id = self.next_id;
        self.next_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Remove a listener. Returns false if the id was already removed.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(listener_id, _)| *listener_id != id);
        self.listeners.len() < before
    }

    pub fn emit(&self, event: &E) {
        for (_, listener) in &self.listeners {
            listener(event);
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl<E> Default for ChangeNotifier<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> fmt::Debug for ChangeNotifier<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn emits_to_all_listeners_in_order() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut notifier = ChangeNotifier::new();
        for _ in 0..3 {
            let calls = Arc::clone(&calls);
            notifier.subscribe(move |value: &u32| {
                calls.fetch_add(*value as usize, Ordering::SeqCst);
            });
        }
        notifier.emit(&2);
        assert_eq!(calls.load(Ordering::SeqCst), 6);
    }

    #[test]
    fn unsubscribe_is_symmetric() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut notifier = ChangeNotifier::new();
        let id = {
            let calls = Arc::clone(&calls);
            notifier.subscribe(move |_: &()| {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        };
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(notifier.listener_count(), 0);
    }
}
