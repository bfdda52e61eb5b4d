//! Shared in-memory remote store.
//!
//! Stands in for the opaque remote service in tests, demos and offline-first
//! deployments: one logical row plus a subscriber fan-out with at-least-once
//! delivery, including the echo back to the pushing client.

use super::{RemoteHandler, RemoteResult, RemoteStore, RemoteSubscription};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError, Weak};

#[derive(Default)]
struct RemoteInner {
    row: Mutex<Option<String>>,
    next_handler_id: AtomicU64,
    handlers: Mutex<Vec<(u64, RemoteHandler)>>,
}

/// Clonable handle onto one shared remote row; every clone is one client of
/// the same logical store.
#[derive(Default, Clone)]
pub struct InMemoryRemote {
    inner: Arc<RemoteInner>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current row contents, for assertions and diagnostics.
    pub fn stored(&self) -> Option<String> {
        self.inner
            .row
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl RemoteStore for InMemoryRemote {
    fn pull(&self) -> RemoteResult<Option<String>> {
        Ok(self.stored())
    }

    fn push(&self, payload: &str) -> RemoteResult<()> {
        {
            let mut row = self.inner.row.lock().unwrap_or_else(PoisonError::into_inner);
            *row = Some(payload.to_string());
        }

        // Snapshot under the lock, notify outside it; handlers re-enter the
        // engine and may trigger further pushes from sibling clients.
        let handlers: Vec<RemoteHandler> = {
            let handlers = self
                .inner
                .handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            handlers
                .iter()
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };
        for handler in handlers {
            handler(payload);
        }

        Ok(())
    }

    fn subscribe(&self, handler: RemoteHandler) -> RemoteSubscription {
        let handler_id = self.inner.next_handler_id.fetch_add(1, Ordering::Relaxed);
        {
            let mut handlers = self
                .inner
                .handlers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            handlers.push((handler_id, handler));
        }

        let inner: Weak<RemoteInner> = Arc::downgrade(&self.inner);
        RemoteSubscription::new(move || {
            if let Some(inner) = inner.upgrade() {
                let mut handlers = inner.handlers.lock().unwrap_or_else(PoisonError::into_inner);
                handlers.retain(|(id, _)| *id != handler_id);
            }
        })
    }

    fn connected(&self) -> bool {
        true
    }
}
