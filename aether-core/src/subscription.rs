//! Callback registries shared by both engines.
//!
//! Callbacks are stored behind `Arc` in a `SlotMap`. Notification clones the
//! current set out of the lock before invoking anything, so a callback may
//! subscribe or unsubscribe (itself included) while being notified.

use crate::common::{read, write, SubscriberId};
use crate::events::SystemEvent;
use slotmap::SlotMap;
use std::any::Any;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, Weak};
use tokio::sync::broadcast;
use tracing::{debug, error};

/// A subscriber callback. It runs synchronously on the notifying task and
/// should return quickly.
pub type Callback<T> = Arc<dyn Fn(&T) + Send + Sync>;

#[doc(hidden)]
pub(crate) struct Registry<T> {
    name: &'static str,
    callbacks: RwLock<SlotMap<SubscriberId, Callback<T>>>,
    system_sender: Option<broadcast::Sender<SystemEvent>>,
}

impl<T: 'static> Registry<T> {
    pub(crate) fn new(
        name: &'static str,
        system_sender: Option<broadcast::Sender<SystemEvent>>,
    ) -> Self {
        Self {
            name,
            callbacks: RwLock::new(SlotMap::with_key()),
            system_sender,
        }
    }

    pub(crate) fn insert(self: &Arc<Self>, callback: Callback<T>) -> Subscription<T> {
        let id = write(&self.callbacks).insert(callback);
        debug!("{}: subscriber {:?} added.", self.name, id);
        if let Some(sender) = &self.system_sender {
            sender.send(SystemEvent::SubscriberAdded { id }).ok();
        }
        Subscription {
            id,
            registry: Arc::downgrade(self),
        }
    }

    pub(crate) fn remove(&self, id: SubscriberId) -> bool {
        let was_removed = write(&self.callbacks).remove(id).is_some();
        if was_removed {
            debug!("{}: subscriber {:?} removed.", self.name, id);
            if let Some(sender) = &self.system_sender {
                sender.send(SystemEvent::SubscriberRemoved { id }).ok();
            }
        }
        was_removed
    }

    pub(crate) fn len(&self) -> usize {
        read(&self.callbacks).len()
    }

    /// Invokes every registered callback with `value`. A panicking callback is
    /// logged and skipped. Returns the number of callbacks that completed.
    pub(crate) fn notify(&self, value: &T) -> usize {
        let snapshot: Vec<(SubscriberId, Callback<T>)> = read(&self.callbacks)
            .iter()
            .map(|(id, callback)| (id, Arc::clone(callback)))
            .collect();

        let mut delivered = 0;
        for (id, callback) in snapshot {
            match catch_unwind(AssertUnwindSafe(|| callback(value))) {
                Ok(()) => delivered += 1,
                Err(payload) => error!(
                    "{}: subscriber {:?} panicked: {}",
                    self.name,
                    id,
                    panic_message(payload.as_ref())
                ),
            }
        }
        delivered
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&'static str>() {
        message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "<non-string panic payload>"
    }
}

/// Handle returned by `subscribe`.
///
/// Dropping the handle does *not* remove the callback; call
/// [`Subscription::unsubscribe`] (or the engine's `unsubscribe` with
/// [`Subscription::id`]) to stop notifications.
#[must_use = "dropping a Subscription leaves the callback registered with no way to remove it but its id"]
pub struct Subscription<T> {
    id: SubscriberId,
    registry: Weak<Registry<T>>,
}

impl<T: 'static> Subscription<T> {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Removes the callback. Returns `false` if it was already removed or the
    /// engine no longer exists.
    pub fn unsubscribe(self) -> bool {
        match self.registry.upgrade() {
            Some(registry) => registry.remove(self.id),
            None => false,
        }
    }
}

impl<T> std::fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
