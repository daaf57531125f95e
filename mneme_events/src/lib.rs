#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions
)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used))]

//! In-process publish/subscribe event bus (§4.2).
//!
//! Constructed once by the composition root and threaded through every
//! publishing component as `Arc<EventBus>`; deliberately not a module-level
//! singleton (§9's redesign guidance against ambient global state).

mod event;

pub use event::Event;

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use tracing::warn;

const DEFAULT_HISTORY_CAPACITY: usize = 100;

type SyncHandler = Box<dyn Fn(&Event) + Send + Sync>;
type AsyncHandler = Box<dyn Fn(Event) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync>;

#[derive(Default)]
struct Subscribers {
    sync: Vec<SyncHandler>,
    r#async: Vec<AsyncHandler>,
}

/// The process-wide pub/sub fan-out point.
pub struct EventBus {
    subscribers: Mutex<std::collections::HashMap<String, Subscribers>>,
    history: Mutex<VecDeque<Event>>,
    history_capacity: usize,
}

impl EventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::with_history_capacity(DEFAULT_HISTORY_CAPACITY)
    }

    #[must_use]
    pub fn with_history_capacity(history_capacity: usize) -> Self {
        Self {
            subscribers: Mutex::new(std::collections::HashMap::new()),
            history: Mutex::new(VecDeque::with_capacity(history_capacity)),
            history_capacity,
        }
    }

    /// Register a synchronous handler for `event_type`. Handlers fire in
    /// subscription order on [`Self::publish`].
    pub fn subscribe(&self, event_type: impl Into<String>, handler: impl Fn(&Event) + Send + Sync + 'static) {
        let mut subs = self.lock_subscribers();
        subs.entry(event_type.into()).or_default().sync.push(Box::new(handler));
    }

    /// Register an asynchronous handler for `event_type`. Handlers fire
    /// concurrently on [`Self::publish_async`], which awaits all of them
    /// before returning.
    pub fn subscribe_async<F>(
        &self,
        event_type: impl Into<String>,
        handler: impl Fn(Event) -> F + Send + Sync + 'static,
    ) where
        F: Future<Output = ()> + Send + 'static,
    {
        let mut subs = self.lock_subscribers();
        subs.entry(event_type.into())
            .or_default()
            .r#async
            .push(Box::new(move |event| Box::pin(handler(event))));
    }

    /// Remove every handler registered for `event_type`. Closures carry no
    /// identity to unsubscribe by reference, so this clears the whole
    /// topic, the coarsest granularity the abstract contract allows.
    pub fn unsubscribe(&self, event_type: &str) {
        self.lock_subscribers().remove(event_type);
    }

    /// Synchronous fan-out, handlers invoked in subscription order. A
    /// failing handler would only ever panic past this function's control;
    /// since handlers here are plain closures (not fallible), "failing" in
    /// practice means panicking, which is isolated with `catch_unwind` so
    /// one bad subscriber never takes down the publisher.
    pub fn publish(&self, event: Event) {
        self.record_history(event.clone());

        let event_type = event.event_type.clone();
        let subs = self.lock_subscribers();
        if let Some(topic) = subs.get(&event_type) {
            for handler in &topic.sync {
                let event_ref = &event;
                let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                    handler(event_ref);
                }));
                if outcome.is_err() {
                    warn!(event_type = %event_type, "event handler panicked; skipped");
                }
            }
        }
    }

    /// Asynchronous fan-out: all registered async handlers for `event.event_type`
    /// run concurrently; this method awaits their completion before returning.
    pub async fn publish_async(&self, event: Event) {
        self.record_history(event.clone());

        let event_type = event.event_type.clone();
        let futures: Vec<_> = {
            let subs = self.lock_subscribers();
            subs.get(&event_type)
                .map(|topic| {
                    topic
                        .r#async
                        .iter()
                        .map(|handler| handler(event.clone()))
                        .collect::<Vec<_>>()
                })
                .unwrap_or_default()
        };

        let tasks: Vec<_> = futures.into_iter().map(tokio::spawn).collect();
        for task in tasks {
            if let Err(e) = task.await {
                warn!(event_type = %event_type, "async event handler panicked: {e}");
            }
        }
    }

    /// The last [`Self::with_history_capacity`] events, oldest first.
    #[must_use]
    pub fn history(&self) -> Vec<Event> {
        self.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner).iter().cloned().collect()
    }

    /// Discard all retained history.
    pub fn clear_history(&self) {
        self.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner).clear();
    }

    fn record_history(&self, event: Event) {
        let mut history = self.history.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
        if history.len() >= self.history_capacity {
            history.pop_front();
        }
        history.push_back(event);
    }

    fn lock_subscribers(&self) -> std::sync::MutexGuard<'_, std::collections::HashMap<String, Subscribers>> {
        self.subscribers.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn sync_handlers_fire_in_subscription_order() {
        let bus = EventBus::new();
        let order = Arc::new(Mutex::new(Vec::new()));

        let order_a = Arc::clone(&order);
        bus.subscribe("memory:stored", move |_| order_a.lock().unwrap().push("a"));
        let order_b = Arc::clone(&order);
        bus.subscribe("memory:stored", move |_| order_b.lock().unwrap().push("b"));

        bus.publish(Event::new("memory:stored", serde_json::json!({})));

        assert_eq!(*order.lock().unwrap(), vec!["a", "b"]);
    }

    #[test]
    fn unrelated_topics_do_not_cross_fire() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));
        let count_clone = Arc::clone(&count);
        bus.subscribe("memory:stored", move |_| {
            count_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Event::new("llm:error", serde_json::json!({})));

        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn a_panicking_handler_is_skipped_not_propagated() {
        let bus = EventBus::new();
        bus.subscribe("x", |_| panic!("boom"));
        let ran = Arc::new(AtomicUsize::new(0));
        let ran_clone = Arc::clone(&ran);
        bus.subscribe("x", move |_| {
            ran_clone.fetch_add(1, Ordering::SeqCst);
        });

        bus.publish(Event::new("x", serde_json::json!({})));

        assert_eq!(ran.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn async_handlers_all_complete_before_publish_async_returns() {
        let bus = EventBus::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count_clone = Arc::clone(&count);
            bus.subscribe_async("context:built", move |_event| {
                let count_clone = Arc::clone(&count_clone);
                async move {
                    tokio::time::sleep(std::time::Duration::from_millis(1)).await;
                    count_clone.fetch_add(1, Ordering::SeqCst);
                }
            });
        }

        bus.publish_async(Event::new("context:built", serde_json::json!({}))).await;

        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn history_ring_is_bounded() {
        let bus = EventBus::with_history_capacity(2);
        bus.publish(Event::new("a", serde_json::json!(1)));
        bus.publish(Event::new("b", serde_json::json!(2)));
        bus.publish(Event::new("c", serde_json::json!(3)));

        let history = bus.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].event_type, "b");
        assert_eq!(history[1].event_type, "c");
    }

    #[test]
    fn clear_history_empties_the_ring() {
        let bus = EventBus::new();
        bus.publish(Event::new("a", serde_json::json!(1)));
        bus.clear_history();
        assert!(bus.history().is_empty());
    }
}
