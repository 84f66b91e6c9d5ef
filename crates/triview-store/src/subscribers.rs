//! Listener registry
//!
//! Listeners are invoked synchronously by whoever calls
//! [`Subscribers::notify`], outside the registry lock, so a listener may
//! subscribe, unsubscribe or read the notifying component.

use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};

type Listener<E> = Arc<dyn Fn(&E) + Send + Sync>;

struct ListenerList<E: ?Sized> {
    next_id: u64,
    listeners: Vec<(u64, Listener<E>)>,
}

/// Registry of listeners for events of type `E`
pub struct Subscribers<E: ?Sized> {
    inner: Arc<Mutex<ListenerList<E>>>,
}

impl<E: ?Sized + 'static> Subscribers<E> {
    /// Create empty registry
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(ListenerList {
                next_id: 0,
                listeners: Vec::new(),
            })),
        }
    }

    /// Register a listener
    ///
    /// The listener stays registered until the returned handle is dropped or
    /// [`Subscription::unsubscribe`] is called.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&E) + Send + Sync + 'static,
    {
        let id = {
            let mut list = self.inner.lock();
            let id = list.next_id;
            list.next_id += 1;
            list.listeners.push((id, Arc::new(listener)));
            id
        };

        let registry: Weak<Mutex<ListenerList<E>>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(registry) = registry.upgrade() {
                    registry.lock().listeners.retain(|(lid, _)| *lid != id);
                }
            })),
        }
    }

    /// Invoke every listener once with `event`
    pub fn notify(&self, event: &E) {
        let listeners: Vec<Listener<E>> = self
            .inner
            .lock()
            .listeners
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in listeners {
            listener(event);
        }
    }

    /// Number of registered listeners
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().listeners.len()
    }

    /// Check if no listener is registered
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<E: ?Sized + 'static> Default for Subscribers<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: ?Sized> fmt::Debug for Subscribers<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscribers")
            .field("listeners", &self.inner.lock().listeners.len())
            .finish()
    }
}

/// Handle to a registered listener
///
/// Dropping the handle unsubscribes. Call [`Subscription::detach`] to keep
/// the listener for the lifetime of the registry.
#[must_use = "dropping a Subscription unsubscribes the listener"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send + Sync>>,
}

impl Subscription {
    /// Remove the listener now
    pub fn unsubscribe(mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }

    /// Keep the listener registered without holding the handle
    pub fn detach(mut self) {
        self.cancel = None;
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.cancel.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn notify_reaches_every_listener() {
        let subs: Subscribers<u64> = Subscribers::new();
        let hits = Arc::new(AtomicUsize::new(0));

        let h1 = Arc::clone(&hits);
        let _a = subs.subscribe(move |_| {
            h1.fetch_add(1, Ordering::SeqCst);
        });
        let h2 = Arc::clone(&hits);
        let _b = subs.subscribe(move |v| {
            h2.fetch_add(*v as usize, Ordering::SeqCst);
        });

        subs.notify(&10);
        assert_eq!(hits.load(Ordering::SeqCst), 11);
    }

    #[test]
    fn dropping_handle_unsubscribes() {
        let subs: Subscribers<u64> = Subscribers::new();
        let sub = subs.subscribe(|_| {});
        assert_eq!(subs.len(), 1);

        drop(sub);
        assert!(subs.is_empty());
    }

    #[test]
    fn detach_keeps_listener() {
        let subs: Subscribers<u64> = Subscribers::new();
        subs.subscribe(|_| {}).detach();
        assert_eq!(subs.len(), 1);
    }

    #[test]
    fn listener_may_unsubscribe_during_notify() {
        let subs: Arc<Subscribers<u64>> = Arc::new(Subscribers::new());
        let slot: Arc<Mutex<Option<Subscription>>> = Arc::new(Mutex::new(None));

        let slot_in = Arc::clone(&slot);
        let sub = subs.subscribe(move |_| {
            if let Some(s) = slot_in.lock().take() {
                s.unsubscribe();
            }
        });
        *slot.lock() = Some(sub);

        subs.notify(&1);
        assert!(subs.is_empty());
    }
}
