//! In-process broadcast hub between tab-like execution contexts.
//!
//! One [`TabHub`] models the shared device; each [`TabEndpoint`] models one
//! tab. Publishing from an endpoint delivers to every handler registered by
//! a *different* endpoint, mirroring how the platform storage signal only
//! fires in contexts that did not perform the write.

use super::{Announcement, TabChannel, TabHandler, TabSignal, TabSubscription};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

struct HandlerEntry {
    id: u64,
    context_id: u64,
    handler: TabHandler,
}

#[derive(Default)]
struct HubInner {
    next_context_id: AtomicU64,
    next_handler_id: AtomicU64,
    handlers: Mutex<Vec<HandlerEntry>>,
}

impl HubInner {
    fn deliver(&self, from_context: u64, signal: &TabSignal) {
        // Snapshot under the lock, invoke outside it, so a handler may
        // publish or subscribe without deadlocking.
        let targets: Vec<TabHandler> = {
            let handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
            handlers
                .iter()
                .filter(|entry| entry.context_id != from_context)
                .map(|entry| Arc::clone(&entry.handler))
                .collect()
        };

        for handler in targets {
            handler(signal);
        }
    }

    fn remove_handler(&self, handler_id: u64) {
        let mut handlers = self.handlers.lock().unwrap_or_else(PoisonError::into_inner);
        handlers.retain(|entry| entry.id != handler_id);
    }
}

/// Shared in-process broadcast hub.
#[derive(Default)]
pub struct TabHub {
    inner: Arc<HubInner>,
}

impl TabHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates one endpoint, i.e. one tab-like context on this device.
    pub fn endpoint(&self) -> TabEndpoint {
        TabEndpoint {
            inner: Arc::clone(&self.inner),
            context_id: self.inner.next_context_id.fetch_add(1, Ordering::Relaxed),
        }
    }
}

/// One execution context's handle onto the hub.
pub struct TabEndpoint {
    inner: Arc<HubInner>,
    context_id: u64,
}

impl TabChannel for TabEndpoint {
    fn publish_replacement(&self, payload: &str) {
        self.inner.deliver(
            self.context_id,
            &TabSignal::Replacement(payload.to_string()),
        );
    }

    fn publish_announcement(&self, announcement: &Announcement) {
        self.inner.deliver(
            self.context_id,
            &TabSignal::Announcement(announcement.clone()),
        );
    }

    fn subscribe(&self, handler: TabHandler) -> TabSubscription {
        let handler_id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut handlers = self
                .inner
                .handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            handlers.push(HandlerEntry {
                id: handler_id,
                context_id: self.context_id,
                handler,
            });
        }

        let inner: Weak<HubInner> = Arc::downgrade(&self.inner);
        TabSubscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.remove_handler(handler_id);
            }
        })
    }
}
