//! Replicated document model and schema migration.
//!
//! # Responsibility
//! - Define the canonical replicated document shared by every context.
//! - Provide pure migration from every previously-shipped schema shape.
//!
//! # Invariants
//! - Location ids are unique and stable once assigned.
//! - Goal fields are always >= 1.
//! - Derived totals are recomputed from the commitment logs, never stored.

pub mod document;
pub mod migrate;
