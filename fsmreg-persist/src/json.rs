//! JSON implementations of the state collaborators.
//!
//! Field order is insertion order, so writing the same fields twice yields
//! byte-identical documents.

use crate::error::PersistError;
use crate::record::{StateReader, StateWriter};
use serde_json::{Map, Value};

/// Builds a JSON object from ordered field writes.
#[derive(Debug, Default)]
pub struct JsonStateWriter {
    fields: Map<String, Value>,
}

impl JsonStateWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` against a fresh writer and returns the compact document.
    pub fn persist(f: impl FnOnce(&mut JsonStateWriter)) -> Result<String, PersistError> {
        let mut writer = Self::new();
        f(&mut writer);
        writer.to_json_string()
    }

    pub fn into_value(self) -> Value {
        Value::Object(self.fields)
    }

    pub fn to_json_string(&self) -> Result<String, PersistError> {
        Ok(serde_json::to_string(&self.fields)?)
    }
}

impl StateWriter for JsonStateWriter {
    fn write_str(&mut self, name: &str, value: &str) {
        self.fields
            .insert(name.to_string(), Value::String(value.to_string()));
    }

    fn write_u64(&mut self, name: &str, value: u64) {
        self.fields.insert(name.to_string(), Value::from(value));
    }

    fn write_level(&mut self, name: &str, level: &dyn Fn(&mut dyn StateWriter)) {
        let mut child = JsonStateWriter::new();
        level(&mut child);
        self.fields.insert(name.to_string(), child.into_value());
    }
}

/// Reads fields from a parsed JSON object.
#[derive(Debug)]
pub struct JsonStateReader<'a> {
    fields: &'a Map<String, Value>,
}

impl<'a> JsonStateReader<'a> {
    /// Wraps a JSON value, which must be an object.
    pub fn new(value: &'a Value) -> Result<Self, PersistError> {
        value
            .as_object()
            .map(|fields| Self { fields })
            .ok_or_else(|| PersistError::restore("state document is not a JSON object"))
    }
}

impl StateReader for JsonStateReader<'_> {
    fn read_str(&self, name: &str) -> Option<&str> {
        self.fields.get(name)?.as_str()
    }

    fn read_u64(&self, name: &str) -> Option<u64> {
        self.fields.get(name)?.as_u64()
    }

    fn read_level(&self, name: &str, level: &mut dyn FnMut(&dyn StateReader) -> bool) -> bool {
        match self.fields.get(name).and_then(Value::as_object) {
            Some(fields) => level(&JsonStateReader { fields }),
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_order_preserved() {
        let json = JsonStateWriter::persist(|w| {
            w.write_str("zeta", "z");
            w.write_u64("alpha", 1);
        })
        .unwrap();
        assert_eq!(json, r#"{"zeta":"z","alpha":1}"#);
    }

    #[test]
    fn test_nested_level() {
        let json = JsonStateWriter::persist(|w| {
            w.write_level("topLevel", &|inner| {
                inner.write_str("machine", "abc");
                inner.write_u64("state", 3);
            });
        })
        .unwrap();
        assert_eq!(json, r#"{"topLevel":{"machine":"abc","state":3}}"#);

        let value: Value = serde_json::from_str(&json).unwrap();
        let reader = JsonStateReader::new(&value).unwrap();
        let mut seen = None;
        assert!(reader.read_level("topLevel", &mut |r| {
            seen = r.read_u64("state");
            r.read_str("machine") == Some("abc")
        }));
        assert_eq!(seen, Some(3));
    }

    #[test]
    fn test_missing_and_mistyped_fields() {
        let value = serde_json::json!({"state": "three", "level": 5});
        let reader = JsonStateReader::new(&value).unwrap();

        assert_eq!(reader.read_u64("state"), None);
        assert_eq!(reader.read_str("missing"), None);
        assert!(!reader.read_level("level", &mut |_| true));
        assert!(!reader.read_level("missing", &mut |_| true));
    }

    #[test]
    fn test_reader_requires_object() {
        let value = serde_json::json!([1, 2, 3]);
        assert!(matches!(
            JsonStateReader::new(&value),
            Err(PersistError::Restore { .. })
        ));
    }
}
