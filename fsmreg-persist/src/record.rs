//! Structured state collaborators.
//!
//! Persistence code talks to these traits rather than to a concrete
//! document format. A writer emits named fields in order and can open
//! nested sub-records; a reader looks fields up by name and can descend
//! into sub-records.

/// Ordered key/value output with nested sub-records.
pub trait StateWriter {
    /// Emits a string field.
    fn write_str(&mut self, name: &str, value: &str);

    /// Emits an unsigned integer field.
    fn write_u64(&mut self, name: &str, value: u64);

    /// Emits a sub-record named `name` whose fields are written by `level`.
    fn write_level(&mut self, name: &str, level: &dyn Fn(&mut dyn StateWriter));
}

/// Named-field input with sub-record traversal.
pub trait StateReader {
    /// Returns a string field, or `None` if missing or not a string.
    fn read_str(&self, name: &str) -> Option<&str>;

    /// Returns an unsigned integer field, or `None` if missing or not an
    /// unsigned integer.
    fn read_u64(&self, name: &str) -> Option<u64>;

    /// Calls `level` with a reader over the sub-record `name`.
    ///
    /// Returns false if the sub-record is missing, is not a record, or
    /// `level` reports failure.
    fn read_level(&self, name: &str, level: &mut dyn FnMut(&dyn StateReader) -> bool) -> bool;
}
