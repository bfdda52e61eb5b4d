//! Cross-tab channel contracts.
//!
//! # Responsibility
//! - Deliver document replacements and transient announcements to every
//!   *other* execution context on the same device.
//! - Hide the concrete broadcast transport from the engine.
//!
//! # Invariants
//! - A context never receives its own publishes.
//! - Dropping or cancelling a subscription is idempotent and teardown-safe.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

mod hub;

pub use hub::{TabEndpoint, TabHub};

/// Transient celebratory message shown by sibling displays; never persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub_text: Option<String>,
}

/// Payload kinds delivered over the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TabSignal {
    /// Full serialized document replacing the receiver's state.
    Replacement(String),
    /// Display-layer announcement; the engine ignores these.
    Announcement(Announcement),
}

pub type TabHandler = Arc<dyn Fn(&TabSignal) + Send + Sync>;

/// Same-device broadcast channel between execution contexts.
pub trait TabChannel: Send + Sync {
    /// Publishes a full-document replacement to all other contexts.
    fn publish_replacement(&self, payload: &str);
    /// Publishes a transient announcement to all other contexts.
    fn publish_announcement(&self, announcement: &Announcement);
    /// Registers a handler for signals published by other contexts.
    fn subscribe(&self, handler: TabHandler) -> TabSubscription;
}

/// Guard releasing one channel subscription.
pub struct TabSubscription {
    cancel: std::sync::Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl TabSubscription {
    pub(crate) fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: std::sync::Mutex::new(Some(Box::new(cancel))),
        }
    }

    /// Releases the subscription. Safe to call more than once.
    pub fn cancel(&self) {
        let cancel = self
            .cancel
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .take();
        if let Some(cancel) = cancel {
            cancel();
        }
    }
}

impl Drop for TabSubscription {
    fn drop(&mut self) {
        self.cancel();
    }
}
