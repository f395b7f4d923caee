//! dp-ledger: Hash-chained audit journal
//!
//! This crate provides:
//! - Footprints: category/action/data notifications emitted by the registry
//!   and the setup processor
//! - Block events: sequenced, hash-chained footprints
//! - An append-only journal with an in-memory retention window and optional
//!   JSON-per-block persistence

pub mod event;
pub mod journal;
pub mod retention;

// Re-export main types
pub use event::{BlockEvent, Footprint};
pub use journal::Journal;
pub use retention::RetentionPolicy;

/// Prelude for convenient imports
pub mod prelude {
    pub use super::event::{BlockEvent, Footprint};
    pub use super::journal::Journal;
    pub use super::retention::RetentionPolicy;
}
