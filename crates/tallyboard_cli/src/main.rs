//! CLI smoke entry point.
//!
//! # Responsibility
//! - Provide a minimal executable to verify `tallyboard_core` wiring.
//! - Keep output deterministic for quick local sanity checks.

use std::error::Error;
use std::sync::Arc;
use tallyboard_core::db::open_db_in_memory;
use tallyboard_core::{
    CommitmentKind, NullRemote, ReconciliationEngine, SqliteSnapshotStore, TabHub,
};

fn main() -> Result<(), Box<dyn Error>> {
    println!("tallyboard_core version={}", tallyboard_core::core_version());

    let hub = TabHub::new();
    let store = SqliteSnapshotStore::try_new(open_db_in_memory()?)?;
    let engine = Arc::new(ReconciliationEngine::new(
        Box::new(store),
        Box::new(hub.endpoint()),
        Box::new(NullRemote::new()),
    ));

    let doc = engine.bootstrap();
    println!(
        "locations={} disciples={} cells={} connected={}",
        doc.locations.len(),
        doc.grand_total(CommitmentKind::Disciple),
        doc.grand_total(CommitmentKind::Cell),
        engine.connected()
    );

    Ok(())
}
