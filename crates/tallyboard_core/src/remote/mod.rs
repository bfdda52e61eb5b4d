//! Remote sync adapter contracts.
//!
//! # Responsibility
//! - Pull/push the serialized document against the authoritative store.
//! - Expose a long-lived push feed of remote-originated replacements.
//!
//! # Invariants
//! - Adapter failures never block or roll back local state; callers log and
//!   continue.
//! - The feed may deliver this client's own pushes; receivers must be
//!   idempotent against that.
//! - `connected()` is informational only and never gates mutations.

use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex, PoisonError};

mod memory;

pub use memory::InMemoryRemote;

pub type RemoteResult<T> = Result<T, RemoteError>;

/// Remote store unavailable or refused an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    Unavailable {
        operation: &'static str,
        message: String,
    },
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unavailable { operation, message } => {
                write!(f, "remote {operation} failed: {message}")
            }
        }
    }
}

impl Error for RemoteError {}

pub type RemoteHandler = Arc<dyn Fn(&str) + Send + Sync>;

/// Opaque push/pull service holding one logical document row.
pub trait RemoteStore: Send + Sync {
    /// Fetches the remote document; `Ok(None)` means the row does not exist.
    fn pull(&self) -> RemoteResult<Option<String>>;
    /// Upserts the document row. Fire-and-forget from the engine's view.
    fn push(&self, payload: &str) -> RemoteResult<()>;
    /// Subscribes to replacements of the row, regardless of origin.
    fn subscribe(&self, handler: RemoteHandler) -> RemoteSubscription;
    /// Informational connectivity flag.
    fn connected(&self) -> bool;
}

/// Guard releasing one remote feed subscription.
pub struct RemoteSubscription {
    cancel: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl RemoteSubscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Subscription guard with nothing to release.
    pub(crate) fn noop() -> Self {
        Self {
            cancel: Mutex::new(None),
        }
    }

    /// Releases the subscription. Safe to call more than once.
    pub fn cancel(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

impl Drop for RemoteSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Capability-absent remote: every operation is a no-op.
///
/// Selected at construction time when no backend is configured, so the
/// engine's logic is identical with and without a real remote.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRemote;

impl NullRemote {
    pub fn new() -> Self {
        Self
    }
}

impl RemoteStore for NullRemote {
    fn pull(&self) -> RemoteResult<Option<String>> {
        Ok(None)
    }

    fn push(&self, _payload: &str) -> RemoteResult<()> {
        Ok(())
    }

    fn subscribe(&self, _handler: RemoteHandler) -> RemoteSubscription {
        RemoteSubscription::noop()
    }

    fn connected(&self) -> bool {
        false
    }
}
