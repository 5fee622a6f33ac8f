//! "Message dispatched" notification.
//!
//! A [`DispatchBus`] fans each successfully dispatched message out to its
//! subscribers. Mailers use the process-wide bus unless one is injected, so a
//! subscriber on the global bus observes messages from every mailer in the
//! process, not only the one it was registered through.

use std::sync::{Arc, PoisonError, RwLock};

use dashmap::DashMap;
use uuid::Uuid;

use super::message::Message;
use super::Mailer;

pub type Callback = Arc<dyn Fn(&Message, &Mailer) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(Uuid);

#[derive(Default)]
pub struct DispatchBus {
    subscribers: DashMap<SubscriptionId, Callback>,
}

impl DispatchBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<F>(&self, callback: F) -> SubscriptionId
    where
        F: Fn(&Message, &Mailer) + Send + Sync + 'static,
    {
        let id = SubscriptionId(Uuid::new_v4());
        self.subscribers.insert(id, Arc::new(callback));
        tracing::trace!(subscription = %id.0, "Dispatch subscriber added");
        id
    }

    /// Returns whether the subscription was still registered.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        tracing::trace!(subscription = %id.0, removed, "Dispatch subscriber removed");
        removed
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }

    pub fn emit(&self, message: &Message, mailer: &Mailer) {
        // Snapshot first: callbacks may (un)subscribe, which would deadlock on a shard lock.
        let callbacks: Vec<Callback> = self
            .subscribers
            .iter()
            .map(|entry| Arc::clone(entry.value()))
            .collect();

        for callback in callbacks {
            callback(message, mailer);
        }
    }
}

static GLOBAL: RwLock<Option<Arc<DispatchBus>>> = RwLock::new(None);

/// Install the process-wide bus. Idempotent: an installed bus is kept.
pub fn install() -> Arc<DispatchBus> {
    let mut slot = GLOBAL.write().unwrap_or_else(PoisonError::into_inner);
    Arc::clone(slot.get_or_insert_with(|| Arc::new(DispatchBus::new())))
}

/// Remove the process-wide bus, dropping its subscribers with it.
pub fn uninstall() {
    GLOBAL
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
}

pub fn global() -> Option<Arc<DispatchBus>> {
    GLOBAL
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .clone()
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::mail::message::MessageFields;

    fn message() -> Message {
        Message::new(MessageFields::new("testing").recipient("to@example.com")).unwrap()
    }

    #[test]
    fn test_emit_reaches_every_subscriber() {
        let bus = DispatchBus::new();
        let hits = Arc::new(AtomicUsize::new(0));

        for _ in 0..3 {
            let hits = Arc::clone(&hits);
            bus.subscribe(move |_, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            });
        }
        bus.emit(&message(), &Mailer::default());

        assert_eq!(hits.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let bus = DispatchBus::new();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let id = bus.subscribe(move |_, _| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        assert!(bus.unsubscribe(id));
        assert!(!bus.unsubscribe(id));
        bus.emit(&message(), &Mailer::default());

        assert_eq!(hits.load(Ordering::SeqCst), 0);
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_callback_may_unsubscribe_itself() {
        let bus = Arc::new(DispatchBus::new());
        let slot: Arc<RwLock<Option<SubscriptionId>>> = Arc::new(RwLock::new(None));

        let inner_bus = Arc::clone(&bus);
        let inner_slot = Arc::clone(&slot);
        let id = bus.subscribe(move |_, _| {
            if let Some(id) = inner_slot.write().unwrap().take() {
                inner_bus.unsubscribe(id);
            }
        });
        *slot.write().unwrap() = Some(id);

        bus.emit(&message(), &Mailer::default());
        assert_eq!(bus.subscriber_count(), 0);
    }
}
