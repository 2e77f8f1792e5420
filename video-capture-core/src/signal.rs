//! Ordered, weakly-subscribed notification signals.
//!
//! A [`Signal`] keeps an ordered list of subscriber callbacks and invokes
//! them in subscription order on `emit`. Only `Weak` references are
//! stored: a subscription never extends the subscriber's lifetime, and
//! dropping the subscriber's `Arc` ends the subscription without an
//! explicit disconnect.

use std::sync::{Arc, Weak};

use parking_lot::Mutex;

/// Callback type stored by a [`Signal`].
pub type SignalFn<T> = dyn Fn(&T) + Send + Sync;

/// Wrap a closure for [`Signal::connect`].
pub fn slot<T>(f: impl Fn(&T) + Send + Sync + 'static) -> Arc<SignalFn<T>> {
    Arc::new(f)
}

/// Identifies one subscription; pass to [`Signal::disconnect`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignalToken(u64);

struct Slots<T> {
    entries: Vec<(SignalToken, Weak<SignalFn<T>>)>,
    next_token: u64,
}

/// An ordered list of weak subscriber callbacks.
pub struct Signal<T> {
    slots: Mutex<Slots<T>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Slots {
                entries: Vec::new(),
                next_token: 0,
            }),
        }
    }

    /// Append a subscriber. The signal holds only a `Weak` reference; the
    /// caller keeps the returned `Arc` alive for as long as it wants to
    /// receive notifications.
    pub fn connect(&self, subscriber: &Arc<SignalFn<T>>) -> SignalToken {
        let mut slots = self.slots.lock();
        let token = SignalToken(slots.next_token);
        slots.next_token += 1;
        slots.entries.push((token, Arc::downgrade(subscriber)));
        token
    }

    /// Remove one subscription. A token for an already-dropped subscriber
    /// is accepted and ignored.
    pub fn disconnect(&self, token: SignalToken) {
        self.slots.lock().entries.retain(|(t, _)| *t != token);
    }

    /// Invoke live subscribers in subscription order, pruning dead ones.
    ///
    /// Callbacks run outside the internal lock, so a handler may connect
    /// or disconnect subscribers (including itself).
    pub fn emit(&self, value: &T) {
        let live: Vec<Arc<SignalFn<T>>> = {
            let mut slots = self.slots.lock();
            slots.entries.retain(|(_, weak)| weak.strong_count() > 0);
            slots
                .entries
                .iter()
                .filter_map(|(_, weak)| weak.upgrade())
                .collect()
        };
        for subscriber in live {
            subscriber(value);
        }
    }

    /// Number of currently live subscriptions.
    pub fn subscriber_count(&self) -> usize {
        self.slots
            .lock()
            .entries
            .iter()
            .filter(|(_, weak)| weak.strong_count() > 0)
            .count()
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn emits_in_subscription_order() {
        let signal = Signal::<i32>::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let o1 = Arc::clone(&order);
        let first = slot(move |v: &i32| o1.lock().push(("first", *v)));
        let o2 = Arc::clone(&order);
        let second = slot(move |v: &i32| o2.lock().push(("second", *v)));

        signal.connect(&first);
        signal.connect(&second);
        signal.emit(&7);

        assert_eq!(*order.lock(), vec![("first", 7), ("second", 7)]);
    }

    #[test]
    fn dropped_subscriber_never_fires() {
        let signal = Signal::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let subscriber = slot(move |_: &()| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        signal.connect(&subscriber);

        signal.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        drop(subscriber);
        signal.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(signal.subscriber_count(), 0);
    }

    #[test]
    fn disconnect_removes_subscription() {
        let signal = Signal::<()>::new();
        let calls = Arc::new(AtomicUsize::new(0));

        let c = Arc::clone(&calls);
        let subscriber = slot(move |_: &()| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let token = signal.connect(&subscriber);
        signal.disconnect(token);

        signal.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn handler_may_disconnect_itself_during_emit() {
        let signal = Arc::new(Signal::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let token_cell = Arc::new(Mutex::new(None::<SignalToken>));

        let sig = Arc::clone(&signal);
        let c = Arc::clone(&calls);
        let cell = Arc::clone(&token_cell);
        let subscriber = slot(move |_: &()| {
            c.fetch_add(1, Ordering::SeqCst);
            if let Some(token) = cell.lock().take() {
                sig.disconnect(token);
            }
        });
        *token_cell.lock() = Some(signal.connect(&subscriber));

        signal.emit(&());
        signal.emit(&());
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
