//! Deterministic checksums of automaton state.
//!
//! The checksum covers the full definition content (through its digest)
//! and the current state index. Two automatons with equal checksums are,
//! with overwhelming probability, bound to equal definitions and sitting
//! in the same state.

use crate::definition::Definition;
use sha2::{Digest, Sha256};

/// Combines a definition and a state index into a 64-bit checksum.
pub fn checksum(definition: &Definition, state: usize) -> u64 {
    let mut hasher = Sha256::new();
    hasher.update(definition.digest());
    hasher.update((state as u64).to_le_bytes());
    let out = hasher.finalize();

    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&out[..8]);
    u64::from_le_bytes(bytes)
}
