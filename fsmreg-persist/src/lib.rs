//! # fsmreg-persist
//!
//! Persistence layer for fsmreg.
//!
//! This crate provides:
//! - Structured writer/reader collaborators and their JSON implementations
//! - Persist/restore of automaton state against a re-declared definition
//! - File-backed snapshot storage with integrity checks

pub mod adapter;
pub mod error;
pub mod json;
pub mod record;
pub mod snapshot;

pub use adapter::{
    deserialize, persist, persist_json, restore, restore_json, serialize, AutomatonRecord,
};
pub use error::PersistError;
pub use json::{JsonStateReader, JsonStateWriter};
pub use record::{StateReader, StateWriter};
pub use snapshot::{SnapshotMeta, SnapshotStore};
