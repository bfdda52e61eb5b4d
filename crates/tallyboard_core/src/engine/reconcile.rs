//! Transition state machine over the replicated document.

use crate::channel::{Announcement, TabChannel, TabSignal, TabSubscription};
use crate::model::document::{Document, ValidationError};
use crate::model::migrate::{migrate_str, MigrationError};
use crate::remote::{RemoteStore, RemoteSubscription};
use crate::store::SnapshotStore;
use log::{error, info, warn};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

pub type EngineResult<T> = Result<T, EngineError>;

/// Engine-surface errors.
///
/// `Validation` on a local mutation is fatal to the caller; the same class
/// on an external replacement means the payload was discarded and the prior
/// state kept.
#[derive(Debug)]
pub enum EngineError {
    /// `bootstrap` has not run yet.
    NotReady,
    Validation(ValidationError),
    Migration(MigrationError),
}

impl Display for EngineError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotReady => write!(f, "engine has not been bootstrapped"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Migration(err) => write!(f, "{err}"),
        }
    }
}

impl Error for EngineError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::NotReady => None,
            Self::Validation(err) => Some(err),
            Self::Migration(err) => Some(err),
        }
    }
}

impl From<ValidationError> for EngineError {
    fn from(value: ValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<MigrationError> for EngineError {
    fn from(value: MigrationError) -> Self {
        Self::Migration(value)
    }
}

/// Source of an inbound full-document replacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    CrossTab,
    Remote,
}

impl Origin {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CrossTab => "cross_tab",
            Self::Remote => "remote",
        }
    }
}

/// What an external replacement did to the engine state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplacementOutcome {
    /// The document changed and was fanned out.
    Applied,
    /// The payload equalled the current state; nothing happened.
    Identical,
}

/// Handle for one in-memory document subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionId(u64);

type DocumentListener = Arc<dyn Fn(&Document) + Send + Sync>;

enum EngineState {
    Uninitialized,
    Ready(Document),
}

/// Guards the channel and remote feed wiring of one engine.
///
/// Dropping it detaches both feeds; detaching is idempotent and safe during
/// teardown.
pub struct FeedBindings {
    _channel: TabSubscription,
    _remote: RemoteSubscription,
}

/// The per-context reconciliation engine.
///
/// Constructed with explicit adapters (no ambient singleton); all other
/// components receive immutable snapshots of the document it owns.
pub struct ReconciliationEngine {
    state: Mutex<EngineState>,
    subscribers: Mutex<Vec<(SubscriptionId, DocumentListener)>>,
    next_subscriber_id: AtomicU64,
    store: Box<dyn SnapshotStore>,
    channel: Box<dyn TabChannel>,
    remote: Box<dyn RemoteStore>,
}

impl ReconciliationEngine {
    pub fn new(
        store: Box<dyn SnapshotStore>,
        channel: Box<dyn TabChannel>,
        remote: Box<dyn RemoteStore>,
    ) -> Self {
        Self {
            state: Mutex::new(EngineState::Uninitialized),
            subscribers: Mutex::new(Vec::new()),
            next_subscriber_id: AtomicU64::new(0),
            store,
            channel,
            remote,
        }
    }

    /// Wires this engine into its cross-tab and remote feeds.
    ///
    /// Keep the returned bindings alive for as long as the engine should
    /// react to sibling tabs and remote replacements.
    pub fn connect_feeds(self: &Arc<Self>) -> FeedBindings {
        let engine = Arc::downgrade(self);
        let channel_sub = self.channel.subscribe(Arc::new(move |signal| {
            if let TabSignal::Replacement(payload) = signal {
                if let Some(engine) = engine.upgrade() {
                    // Failures are logged inside; a bad sibling payload must
                    // not tear down the feed.
                    let _ = engine.apply_external(payload, Origin::CrossTab);
                }
            }
        }));

        let engine = Arc::downgrade(self);
        let remote_sub = self.remote.subscribe(Arc::new(move |payload| {
            if let Some(engine) = engine.upgrade() {
                let _ = engine.apply_external(payload, Origin::Remote);
            }
        }));

        FeedBindings {
            _channel: channel_sub,
            _remote: remote_sub,
        }
    }

    /// Establishes the initial `Ready` state.
    ///
    /// Local snapshot (or the seeded default) is tentative; a reachable
    /// remote with data wins over it, and an empty remote is initialized
    /// with the tentative document (first writer creates the row).
    pub fn bootstrap(&self) -> Document {
        let tentative = self.load_local_snapshot();

        let (doc, source) = match self.remote.pull() {
            Ok(Some(raw)) => match migrate_str(&raw).map_err(EngineError::from).and_then(|doc| {
                doc.validate()?;
                Ok(doc)
            }) {
                Ok(remote_doc) => (remote_doc, "remote"),
                Err(err) => {
                    warn!("event=bootstrap module=engine status=degraded reason=remote_document_rejected error={err}");
                    (tentative, "local")
                }
            },
            Ok(None) => {
                if let Some(payload) = self.serialize(&tentative) {
                    if let Err(err) = self.remote.push(&payload) {
                        warn!("event=remote_push module=engine status=error phase=bootstrap error={err}");
                    }
                }
                (tentative, "local")
            }
            Err(err) => {
                warn!("event=remote_pull module=engine status=error phase=bootstrap error={err}");
                (tentative, "local")
            }
        };

        {
            let mut state = self.lock_state();
            *state = EngineState::Ready(doc.clone());
        }

        if let Some(payload) = self.serialize(&doc) {
            self.persist(&payload);
            self.channel.publish_replacement(&payload);
        }
        self.notify_subscribers(&doc);

        info!("event=bootstrap module=engine status=ok source={source}");
        doc
    }

    /// Applies a pure local mutation and fans it out everywhere.
    ///
    /// An invariant violation in the produced document is a caller error:
    /// nothing is committed and the error is returned.
    pub fn apply_local_mutation(
        &self,
        mutate: impl FnOnce(&Document) -> Document,
    ) -> EngineResult<Document> {
        let next = {
            let mut state = self.lock_state();
            let current = match &*state {
                EngineState::Ready(doc) => doc,
                EngineState::Uninitialized => return Err(EngineError::NotReady),
            };
            let next = mutate(current);
            next.validate()?;
            *state = EngineState::Ready(next.clone());
            next
        };

        info!("event=transition module=engine status=ok origin=local");

        if let Some(payload) = self.serialize(&next) {
            self.persist(&payload);
            self.channel.publish_replacement(&payload);
            if let Err(err) = self.remote.push(&payload) {
                warn!("event=remote_push module=engine status=error error={err}");
            }
        }
        self.notify_subscribers(&next);

        Ok(next)
    }

    /// Applies a full-document replacement coming from another replica.
    ///
    /// A payload that fails migration or invariant validation is discarded
    /// and the prior state kept. A payload equal to the current state is a
    /// no-op, which is what breaks replication echo loops.
    pub fn apply_external(&self, raw: &str, origin: Origin) -> EngineResult<ReplacementOutcome> {
        let doc = match migrate_str(raw) {
            Ok(doc) => doc,
            Err(err) => {
                warn!(
                    "event=replacement_discarded module=engine origin={} error={err}",
                    origin.as_str()
                );
                return Err(err.into());
            }
        };
        if let Err(err) = doc.validate() {
            warn!(
                "event=replacement_discarded module=engine origin={} error={err}",
                origin.as_str()
            );
            return Err(err.into());
        }

        {
            let mut state = self.lock_state();
            if let EngineState::Ready(current) = &*state {
                if *current == doc {
                    return Ok(ReplacementOutcome::Identical);
                }
            }
            *state = EngineState::Ready(doc.clone());
        }

        info!(
            "event=transition module=engine status=ok origin={}",
            origin.as_str()
        );

        if let Some(payload) = self.serialize(&doc) {
            // The device-local cache stays current for either origin, but the
            // replacement is never pushed back where it came from.
            self.persist(&payload);
            if origin == Origin::Remote {
                self.channel.publish_replacement(&payload);
            }
        }
        self.notify_subscribers(&doc);

        Ok(ReplacementOutcome::Applied)
    }

    /// Forced pull, treated as an external replacement with origin Remote.
    pub fn manual_refresh(&self) -> EngineResult<ReplacementOutcome> {
        match self.remote.pull() {
            Ok(Some(raw)) => self.apply_external(&raw, Origin::Remote),
            Ok(None) => Ok(ReplacementOutcome::Identical),
            Err(err) => {
                warn!("event=remote_pull module=engine status=error phase=refresh error={err}");
                Ok(ReplacementOutcome::Identical)
            }
        }
    }

    /// Synchronous snapshot of the authoritative document.
    pub fn current(&self) -> EngineResult<Document> {
        match &*self.lock_state() {
            EngineState::Ready(doc) => Ok(doc.clone()),
            EngineState::Uninitialized => Err(EngineError::NotReady),
        }
    }

    /// Registers an in-memory listener invoked after every applied
    /// transition with the new document.
    pub fn subscribe(
        &self,
        listener: impl Fn(&Document) + Send + Sync + 'static,
    ) -> SubscriptionId {
        let id = SubscriptionId(self.next_subscriber_id.fetch_add(1, Ordering::Relaxed));
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.push((id, Arc::new(listener)));
        id
    }

    /// Removes a listener. Unknown or already-removed ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        let mut subscribers = self
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        subscribers.retain(|(sub_id, _)| *sub_id != id);
    }

    /// Informational remote connectivity; never gates mutations.
    pub fn connected(&self) -> bool {
        self.remote.connected()
    }

    /// Broadcasts a transient announcement to sibling contexts.
    pub fn announce(&self, announcement: &Announcement) {
        self.channel.publish_announcement(announcement);
    }

    fn lock_state(&self) -> MutexGuard<'_, EngineState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn load_local_snapshot(&self) -> Document {
        match self.store.load() {
            Ok(Some(raw)) => match migrate_str(&raw).map_err(EngineError::from).and_then(|doc| {
                doc.validate()?;
                Ok(doc)
            }) {
                Ok(doc) => doc,
                Err(err) => {
                    warn!("event=snapshot_migrate module=engine status=error error={err}");
                    Document::initial()
                }
            },
            Ok(None) => Document::initial(),
            Err(err) => {
                error!("event=snapshot_load module=engine status=error error={err}");
                Document::initial()
            }
        }
    }

    fn serialize(&self, doc: &Document) -> Option<String> {
        match serde_json::to_string(doc) {
            Ok(payload) => Some(payload),
            Err(err) => {
                error!("event=serialize module=engine status=error error={err}");
                None
            }
        }
    }

    /// Local save failures degrade to in-memory-only operation.
    fn persist(&self, payload: &str) {
        if let Err(err) = self.store.save(payload) {
            error!("event=snapshot_save module=engine status=error error={err}");
        }
    }

    fn notify_subscribers(&self, doc: &Document) {
        // Snapshot under the lock, invoke outside it, so listeners may
        // subscribe or unsubscribe without deadlocking.
        let listeners: Vec<DocumentListener> = {
            let subscribers = self
                .subscribers
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            subscribers
                .iter()
                .map(|(_, listener)| Arc::clone(listener))
                .collect()
        };
        for listener in listeners {
            listener(doc);
        }
    }
}
