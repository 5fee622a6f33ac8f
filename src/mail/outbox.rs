use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use super::message::Message;
use super::signals::{DispatchBus, SubscriptionId};

/// Shared, ordered capture list filled while a [`Recorder`] is alive.
#[derive(Debug, Clone, Default)]
pub struct Outbox(Arc<Mutex<Vec<Message>>>);

impl Outbox {
    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push(&self, message: Message) {
        self.lock().push(message);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn get(&self, index: usize) -> Option<Message> {
        self.lock().get(index).cloned()
    }

    /// Snapshot in dispatch order.
    pub fn messages(&self) -> Vec<Message> {
        self.lock().clone()
    }
}

/// Recording scope returned by `Mailer::record_messages`.
///
/// The subscription lives exactly as long as this guard; dropping it (also
/// while unwinding) unsubscribes. Outbox handles taken from it stay readable
/// afterwards but no longer grow.
pub struct Recorder {
    bus: Arc<DispatchBus>,
    subscription: SubscriptionId,
    outbox: Outbox,
}

impl Recorder {
    pub(crate) fn start(bus: Arc<DispatchBus>) -> Self {
        let outbox = Outbox::default();
        let sink = outbox.clone();
        let subscription = bus.subscribe(move |message, _| sink.push(message.clone()));

        Self {
            bus,
            subscription,
            outbox,
        }
    }

    pub fn outbox(&self) -> Outbox {
        self.outbox.clone()
    }

    pub fn len(&self) -> usize {
        self.outbox.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outbox.is_empty()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.outbox.messages()
    }

    /// End the scope, unsubscribing, and hand back the outbox itself.
    pub fn finish(mut self) -> Outbox {
        std::mem::take(&mut self.outbox)
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        self.bus.unsubscribe(self.subscription);
    }
}
