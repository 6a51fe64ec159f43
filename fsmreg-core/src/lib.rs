//! # fsmreg-core
//!
//! Deduplicating finite automaton registry.
//!
//! This crate provides:
//! - Definition validation and structural identity
//! - A concurrent registry handing out stable definition ids
//! - Automaton instances driven by symbol application
//! - Deterministic checksums of automaton state

pub mod checksum;
pub mod definition;
pub mod error;
pub mod instance;
pub mod registry;

pub use checksum::checksum;
pub use definition::{Definition, DefinitionParts};
pub use error::CoreError;
pub use instance::Automaton;
pub use registry::{Registry, RegistryId};
