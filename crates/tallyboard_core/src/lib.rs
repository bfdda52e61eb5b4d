//! Core state synchronization for the tallyboard commitment board.
//! This crate is the single source of truth for document invariants.

pub mod channel;
pub mod db;
pub mod engine;
pub mod logging;
pub mod model;
pub mod remote;
pub mod service;
pub mod store;

pub use channel::{Announcement, TabChannel, TabEndpoint, TabHub, TabSignal, TabSubscription};
pub use engine::reconcile::{
    EngineError, EngineResult, FeedBindings, Origin, ReconciliationEngine, ReplacementOutcome,
    SubscriptionId,
};
pub use logging::{default_log_level, init_logging, logging_status};
pub use model::document::{
    AdminMode, CommitmentEntry, CommitmentKind, Document, Location, ValidationError, ViewMode,
    CURRENT_SCHEMA_VERSION, MAX_COMMITMENT_AMOUNT,
};
pub use model::migrate::{migrate, migrate_str, MigrationError, MigrationResult};
pub use remote::{
    InMemoryRemote, NullRemote, RemoteError, RemoteResult, RemoteStore, RemoteSubscription,
};
pub use service::board_service::{BoardService, LocationEdit, NewLocation};
pub use store::{
    SnapshotStore, SqliteSnapshotStore, StoreError, StoreResult, LEGACY_SNAPSHOT_KEY, SNAPSHOT_KEY,
};

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
