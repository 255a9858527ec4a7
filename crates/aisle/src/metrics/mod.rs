//! Metrics for aisle ingestion runs.
//!
//! Events implement `aisle_core::metrics::InternalEvent` and are emitted
//! with `aisle_core::emit!`.

pub mod events;

pub use events::*;
