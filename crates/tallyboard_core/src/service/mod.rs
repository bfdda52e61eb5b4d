//! Use-case services over the reconciliation engine.
//!
//! # Responsibility
//! - Expose one typed entry point per business operation.
//! - Keep callers decoupled from transition and persistence details.

pub mod board_service;
