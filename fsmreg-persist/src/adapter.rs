//! Automaton persistence.
//!
//! A persisted automaton is a record of two fields:
//!
//! ```json
//! {"machine": "<definition fingerprint>", "state": 1}
//! ```
//!
//! The definition itself is not persisted. Before restoring, the caller
//! declares the same definition again; restore checks the fingerprint
//! against it and then sets the state.

use crate::error::PersistError;
use crate::json::{JsonStateReader, JsonStateWriter};
use crate::record::{StateReader, StateWriter};
use fsmreg_core::Automaton;
use serde::{Deserialize, Serialize};

/// Field holding the definition fingerprint.
pub const MACHINE_TAG: &str = "machine";
/// Field holding the current state index.
pub const STATE_TAG: &str = "state";

/// Observable state of an automaton.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutomatonRecord {
    /// Hex fingerprint of the bound definition.
    pub machine: String,

    /// Current state index.
    pub state: usize,
}

impl AutomatonRecord {
    /// Emits the record fields, in a fixed order.
    pub fn write(&self, writer: &mut dyn StateWriter) {
        writer.write_str(MACHINE_TAG, &self.machine);
        writer.write_u64(STATE_TAG, self.state as u64);
    }

    /// Reads the record fields back.
    pub fn read(reader: &dyn StateReader) -> Result<Self, PersistError> {
        let machine = reader
            .read_str(MACHINE_TAG)
            .ok_or_else(|| PersistError::restore(format!("missing or malformed '{}'", MACHINE_TAG)))?
            .to_string();
        let state = reader
            .read_u64(STATE_TAG)
            .ok_or_else(|| PersistError::restore(format!("missing or malformed '{}'", STATE_TAG)))?;
        let state = usize::try_from(state)
            .map_err(|_| PersistError::restore(format!("state {} does not fit in usize", state)))?;

        Ok(Self { machine, state })
    }
}

/// Captures the observable state of `automaton`.
pub fn serialize(automaton: &Automaton) -> AutomatonRecord {
    AutomatonRecord {
        machine: automaton.definition().fingerprint(),
        state: automaton.state(),
    }
}

/// Builds an automaton from `record`, bound to the same definition as
/// `declared`.
pub fn deserialize(
    record: &AutomatonRecord,
    declared: &Automaton,
) -> Result<Automaton, PersistError> {
    let mut automaton = declared.clone();
    apply_record(&mut automaton, record)?;
    Ok(automaton)
}

/// Writes the state of `automaton` to `writer`.
pub fn persist(automaton: &Automaton, writer: &mut dyn StateWriter) {
    serialize(automaton).write(writer);
}

/// Restores the state of `automaton` from `reader`.
///
/// On failure the automaton is left unchanged.
pub fn restore(automaton: &mut Automaton, reader: &dyn StateReader) -> Result<(), PersistError> {
    let record = AutomatonRecord::read(reader)?;
    apply_record(automaton, &record)
}

/// Persists `automaton` as a compact JSON document.
pub fn persist_json(automaton: &Automaton) -> Result<String, PersistError> {
    JsonStateWriter::persist(|writer| persist(automaton, writer))
}

/// Restores `automaton` from a JSON document produced by [`persist_json`].
pub fn restore_json(automaton: &mut Automaton, json: &str) -> Result<(), PersistError> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let reader = JsonStateReader::new(&value)?;
    restore(automaton, &reader)
}

fn apply_record(automaton: &mut Automaton, record: &AutomatonRecord) -> Result<(), PersistError> {
    let expected = automaton.definition().fingerprint();
    if record.machine != expected {
        return Err(PersistError::restore(format!(
            "definition mismatch: persisted {}, declared {}",
            record.machine, expected
        )));
    }
    automaton.restore_state(record.state)?;
    Ok(())
}
