//! Document level key signals with scoped subscriptions.
//!
//! A [`KeySubscription`] receives every signal dispatched while it is alive. Dropping it
//! unsubscribes, so a component cannot forget to release its listener when it goes away.

use std::collections::VecDeque;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Key signal relevant for the viewer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeySignal {
    /// Escape key.
    Escape,
}

type Queue = Arc<Mutex<VecDeque<KeySignal>>>;

#[derive(Default)]
struct Subscribers {
    next_id: u64,
    queues: Vec<(u64, Queue)>,
}

/// Distributes key signals to subscribers.
#[derive(Clone, Default)]
pub struct KeyDispatcher {
    subscribers: Arc<Mutex<Subscribers>>,
}

impl KeyDispatcher {
    /// Creates a dispatcher without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to all signals dispatched from now on.
    pub fn subscribe(&self) -> KeySubscription {
        let queue = Queue::default();
        let mut subscribers = self.subscribers.lock();
        let id = subscribers.next_id;
        subscribers.next_id += 1;
        subscribers.queues.push((id, queue.clone()));

        KeySubscription {
            id,
            queue,
            subscribers: Arc::downgrade(&self.subscribers),
        }
    }

    /// Sends the signal to every live subscription.
    pub fn dispatch(&self, signal: KeySignal) {
        for (_, queue) in &self.subscribers.lock().queues {
            queue.lock().push_back(signal);
        }
    }

    /// Number of live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.lock().queues.len()
    }
}

/// Live subscription to key signals. Unsubscribes on drop.
pub struct KeySubscription {
    id: u64,
    queue: Queue,
    subscribers: Weak<Mutex<Subscribers>>,
}

impl KeySubscription {
    /// Takes all signals received since the last call.
    pub fn drain(&self) -> Vec<KeySignal> {
        self.queue.lock().drain(..).collect()
    }
}

impl Drop for KeySubscription {
    fn drop(&mut self) {
        if let Some(subscribers) = self.subscribers.upgrade() {
            subscribers.lock().queues.retain(|(id, _)| *id != self.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscription_receives_signals_until_dropped() {
        let dispatcher = KeyDispatcher::new();
        let first = dispatcher.subscribe();
        let second = dispatcher.subscribe();
        assert_eq!(dispatcher.subscriber_count(), 2);

        dispatcher.dispatch(KeySignal::Escape);
        assert_eq!(first.drain(), vec![KeySignal::Escape]);
        assert!(first.drain().is_empty());

        drop(second);
        assert_eq!(dispatcher.subscriber_count(), 1);

        dispatcher.dispatch(KeySignal::Escape);
        assert_eq!(first.drain(), vec![KeySignal::Escape]);
    }

    #[test]
    fn signals_before_subscribing_are_not_seen() {
        let dispatcher = KeyDispatcher::new();
        dispatcher.dispatch(KeySignal::Escape);

        let subscription = dispatcher.subscribe();
        assert!(subscription.drain().is_empty());
    }

    #[test]
    fn subscription_outlives_dispatcher() {
        let dispatcher = KeyDispatcher::new();
        let subscription = dispatcher.subscribe();
        drop(dispatcher);
        assert!(subscription.drain().is_empty());
    }
}
