//! Subscriber registry and fan-out.

use crate::events::types::ChangeEvent;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

type Subscriber = Arc<dyn Fn(&ChangeEvent) -> Result<(), BoxError> + Send + Sync>;

/// Fan-out pub/sub for [`ChangeEvent`]s.
///
/// Subscribers are invoked synchronously on the writer's task, so an event is
/// fully delivered before the triggering update returns. A subscriber that
/// fails is logged and skipped; it never breaks siblings or the writer.
pub struct ChangeNotifier {
    subscribers: DashMap<u64, Subscriber>,
    next_id: AtomicU64,
}

impl ChangeNotifier {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a subscriber. Returns an id for [`unsubscribe`](Self::unsubscribe).
    pub fn subscribe<F>(&self, callback: F) -> u64
    where
        F: Fn(&ChangeEvent) -> Result<(), BoxError> + Send + Sync + 'static,
    {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.subscribers.insert(id, Arc::new(callback));
        id
    }

    /// Remove a subscriber. Returns false if the id was unknown.
    pub fn unsubscribe(&self, id: u64) -> bool {
        self.subscribers.remove(&id).is_some()
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    /// Deliver an event to every subscriber, collecting failures instead of
    /// propagating them. Returns the number of successful deliveries.
    pub fn notify(&self, event: &ChangeEvent) -> usize {
        // Snapshot first so callbacks may subscribe/unsubscribe freely.
        let subscribers: Vec<(u64, Subscriber)> = self
            .subscribers
            .iter()
            .map(|entry| (*entry.key(), entry.value().clone()))
            .collect();

        let mut delivered = 0;
        let mut failures = Vec::new();
        for (id, subscriber) in subscribers {
            match subscriber(event) {
                Ok(()) => delivered += 1,
                Err(e) => failures.push((id, e)),
            }
        }

        for (id, error) in failures {
            tracing::warn!(
                subscriber_id = id,
                kind = ?event.kind,
                source = %event.source,
                error = %error,
                "Change subscriber failed; continuing with remaining subscribers"
            );
        }

        delivered
    }
}

impl Default for ChangeNotifier {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::types::ChangeKind;
    use std::sync::atomic::AtomicUsize;

    fn event() -> ChangeEvent {
        ChangeEvent::new(ChangeKind::Update, "test")
    }

    #[test]
    fn delivers_to_all_subscribers() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let count = count.clone();
            notifier.subscribe(move |_| {
                count.fetch_add(1, Ordering::SeqCst);
                Ok(())
            });
        }

        assert_eq!(notifier.notify(&event()), 3);
        assert_eq!(count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn failing_subscriber_does_not_break_siblings() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicUsize::new(0));

        notifier.subscribe(|_| Err("boom".into()));
        let c = count.clone();
        notifier.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        assert_eq!(notifier.notify(&event()), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let notifier = ChangeNotifier::new();
        let count = Arc::new(AtomicUsize::new(0));

        let c = count.clone();
        let id = notifier.subscribe(move |_| {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });

        notifier.notify(&event());
        assert!(notifier.unsubscribe(id));
        assert!(!notifier.unsubscribe(id));
        notifier.notify(&event());

        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert_eq!(notifier.subscriber_count(), 0);
    }

    #[test]
    fn subscriber_may_unsubscribe_itself_during_notify() {
        let notifier = Arc::new(ChangeNotifier::new());
        let slot: Arc<std::sync::Mutex<Option<u64>>> = Arc::default();

        let n = notifier.clone();
        let s = slot.clone();
        let id = notifier.subscribe(move |_| {
            if let Some(id) = *s.lock().unwrap() {
                n.unsubscribe(id);
            }
            Ok(())
        });
        *slot.lock().unwrap() = Some(id);

        notifier.notify(&event());
        assert_eq!(notifier.subscriber_count(), 0);
    }
}
