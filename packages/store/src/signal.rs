//! Change-notification channels for model objects.
//!
//! A [`Signal`] is a multicast callback list: model objects own one signal per
//! event kind, observers register handlers and hold on to the returned
//! [`Subscription`] guard, and dropping the guard disconnects the handler.
//! Emission snapshots the handler list before invoking anything, so handlers
//! may connect, disconnect, or dispose the signal re-entrantly without
//! corrupting iteration.

use std::fmt;
use std::sync::{Arc, Mutex, Weak};

type Handler<T> = Arc<dyn Fn(&T) + Send + Sync + 'static>;

struct SignalInner<T> {
    handlers: Vec<(u64, Handler<T>)>,
    next_id: u64,
    disposed: bool,
}

/// A multicast change-notification channel.
pub struct Signal<T> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

impl<T> Signal<T> {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                handlers: Vec::new(),
                next_id: 1,
                disposed: false,
            })),
        }
    }

    /// Register a handler. The handler stays connected until the returned
    /// guard is dropped or the signal is disposed.
    pub fn connect<F>(&self, handler: F) -> Subscription
    where
        T: 'static,
        F: Fn(&T) + Send + Sync + 'static,
    {
        let mut inner = self.inner.lock().unwrap();
        if inner.disposed {
            return Subscription { cancel: None };
        }
        let id = inner.next_id;
        inner.next_id += 1;
        inner.handlers.push((id, Arc::new(handler)));

        let weak: Weak<Mutex<SignalInner<T>>> = Arc::downgrade(&self.inner);
        Subscription {
            cancel: Some(Box::new(move || {
                if let Some(inner) = weak.upgrade() {
                    let mut inner = inner.lock().unwrap();
                    inner.handlers.retain(|(hid, _)| *hid != id);
                }
            })),
        }
    }

    /// Invoke every connected handler with `payload`.
    ///
    /// Handlers connected or disconnected by another handler during this call
    /// take effect on the next emission.
    pub fn emit(&self, payload: &T) {
        let snapshot: Vec<Handler<T>> = {
            let inner = self.inner.lock().unwrap();
            if inner.disposed {
                return;
            }
            inner.handlers.iter().map(|(_, h)| Arc::clone(h)).collect()
        };
        for handler in snapshot {
            handler(payload);
        }
    }

    pub fn handler_count(&self) -> usize {
        self.inner.lock().unwrap().handlers.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.lock().unwrap().disposed
    }

    /// Disconnect all handlers and make the signal inert. Idempotent; later
    /// `connect` and `emit` calls are no-ops.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.disposed = true;
        inner.handlers.clear();
    }
}

impl<T> Default for Signal<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> fmt::Debug for Signal<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.lock().unwrap();
        f.debug_struct("Signal")
            .field("handlers", &inner.handlers.len())
            .field("disposed", &inner.disposed)
            .finish()
    }
}

/// RAII guard for a connected handler. Dropping it disconnects the handler.
#[must_use = "dropping a Subscription disconnects its handler"]
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    /// Leave the handler connected for the rest of the signal's lifetime.
    pub fn forget(mut self) {
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
