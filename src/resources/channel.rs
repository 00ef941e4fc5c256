//! # In-process multicast channel.
//!
//! [`Channel`] is the sample path between an input and whoever subscribed to it.
//! It is deliberately not a queue:
//!
//! - `publish` calls every subscriber **synchronously**, in subscription order;
//! - nothing is buffered; with zero subscribers the value is discarded;
//! - subscriptions last for the lifetime of the channel (no unsubscribe).
//!
//! A callback that panics is logged and skipped; the rest still receive the value.
//!
//! A slow subscriber delays the ones after it, and delays the producer's next tick.
//! Both the channel and its callbacks stay on the driver thread.

use std::cell::RefCell;
use std::fmt;
use std::panic::AssertUnwindSafe;
use std::rc::Rc;

use tracing::warn;

use crate::error::panic_message;

type Callback<T> = Rc<dyn Fn(&T)>;

/// Synchronous multicast publish/subscribe primitive.
pub struct Channel<T> {
    subscribers: RefCell<Vec<Callback<T>>>,
}

impl<T> Channel<T> {
    /// Creates a channel with no subscribers.
    pub fn new() -> Self {
        Self {
            subscribers: RefCell::new(Vec::new()),
        }
    }

    /// Appends `callback` to the subscriber list. Duplicates are not detected.
    pub fn subscribe(&self, callback: impl Fn(&T) + 'static) {
        self.subscribers.borrow_mut().push(Rc::new(callback));
    }

    /// Delivers `value` to every subscriber registered at the time of the call.
    ///
    /// Returns the number of callbacks invoked; `0` means the value was discarded.
    /// Callbacks may subscribe further callbacks; those see the next publish, not this one.
    pub fn publish(&self, value: &T) -> usize {
        let snapshot: Vec<Callback<T>> = self.subscribers.borrow().clone();
        for (index, callback) in snapshot.iter().enumerate() {
            if let Err(panic) = std::panic::catch_unwind(AssertUnwindSafe(|| callback(value))) {
                warn!(subscriber = index, reason = %panic_message(&*panic), "subscriber panicked");
            }
        }
        snapshot.len()
    }

    /// Number of subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.borrow().len()
    }
}

impl<T> Default for Channel<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Channel<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Channel")
            .field("subscribers", &self.subscriber_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_subscriber_gets_value_once_in_order() {
        let channel = Channel::<u32>::new();
        let trace = Rc::new(RefCell::new(Vec::new()));

        for id in 0..5 {
            let trace = trace.clone();
            channel.subscribe(move |v: &u32| trace.borrow_mut().push((id, *v)));
        }

        assert_eq!(channel.publish(&42), 5);
        assert_eq!(
            *trace.borrow(),
            vec![(0, 42), (1, 42), (2, 42), (3, 42), (4, 42)]
        );
    }

    #[test]
    fn test_publish_without_subscribers_discards() {
        let channel = Channel::<u32>::new();
        assert_eq!(channel.publish(&1), 0);

        let seen = Rc::new(RefCell::new(Vec::new()));
        let s = seen.clone();
        channel.subscribe(move |v: &u32| s.borrow_mut().push(*v));
        channel.publish(&2);

        assert_eq!(*seen.borrow(), vec![2]);
    }

    #[test]
    fn test_duplicate_subscription_delivers_twice() {
        let channel = Channel::<u32>::new();
        let hits = Rc::new(RefCell::new(0));
        let cb = {
            let hits = hits.clone();
            move |_: &u32| *hits.borrow_mut() += 1
        };
        channel.subscribe(cb.clone());
        channel.subscribe(cb);

        channel.publish(&0);
        assert_eq!(*hits.borrow(), 2);
    }

    #[test]
    fn test_subscribe_during_publish_applies_to_next_publish() {
        let channel = Rc::new(Channel::<u32>::new());
        let late_hits = Rc::new(RefCell::new(0));

        let ch = channel.clone();
        let hits = late_hits.clone();
        channel.subscribe(move |_: &u32| {
            let hits = hits.clone();
            ch.subscribe(move |_: &u32| *hits.borrow_mut() += 1);
        });

        assert_eq!(channel.publish(&1), 1);
        assert_eq!(*late_hits.borrow(), 0);
        assert_eq!(channel.publish(&2), 2);
        assert_eq!(*late_hits.borrow(), 1);
    }

    #[test]
    fn test_panicking_subscriber_does_not_starve_the_rest() {
        let channel = Channel::<u32>::new();
        let seen = Rc::new(RefCell::new(Vec::new()));

        channel.subscribe(|_: &u32| panic!("bad subscriber"));
        let s = seen.clone();
        channel.subscribe(move |v: &u32| s.borrow_mut().push(*v));

        assert_eq!(channel.publish(&1), 2);
        assert_eq!(channel.publish(&2), 2);
        assert_eq!(*seen.borrow(), vec![1, 2]);
    }
}
