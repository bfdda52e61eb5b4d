//! Reconciliation engine: the authoritative in-memory document and the
//! transition state machine arbitrating every replacement.
//!
//! # Responsibility
//! - Own the single authoritative in-memory copy per context.
//! - Decide, per incoming signal, whether and how to replace it, and which
//!   side effects to fan out.
//!
//! # Invariants
//! - Transitions commit atomically and serially under one state lock.
//! - Side effects (persist, publish, push, broadcast) are issued only after
//!   a transition has committed.
//! - An inbound replacement is never re-pushed to the channel it came from.

pub mod reconcile;
