//! FlowRecord - decoded flow record, and its formatted form
//!
//! Records arrive already decoded; the dispatcher formats each one exactly once
//! into a [`FormattedRecord`] that every sink reads.

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::ops::Deref;

/// Information element identifier (16-bit id space)
pub type ElementId = u16;

/// Decoded value of a single information element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldValue {
    Unsigned(u64),
    Signed(i64),
    Float(f64),
    Bool(bool),
    Ip(IpAddr),
    Mac([u8; 6]),
    Str(String),
    Octets(Vec<u8>),
    /// Milliseconds since the Unix epoch
    TimestampMs(i64),
}

/// One element of a record: identifier plus decoded value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    pub id: ElementId,
    pub value: FieldValue,
}

/// A decoded flow record
///
/// Fields are kept in the order they were decoded; formatting preserves it.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FlowRecord {
    pub fields: Vec<Field>,
}

impl FlowRecord {
    /// Create an empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field, builder style
    pub fn with(mut self, id: ElementId, value: FieldValue) -> Self {
        self.fields.push(Field { id, value });
        self
    }

    /// Look up the first field with the given id
    pub fn get(&self, id: ElementId) -> Option<&FieldValue> {
        self.fields.iter().find(|f| f.id == id).map(|f| &f.value)
    }
}

/// Immutable, cheaply shared formatted record.
///
/// Produced once per record by the dispatcher and handed to every sink by
/// reference. There is no way to mutate the bytes through this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormattedRecord(Bytes);

impl FormattedRecord {
    pub fn new(bytes: Bytes) -> Self {
        Self(bytes)
    }

    /// Raw bytes of the record
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Length in bytes
    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Deref for FormattedRecord {
    type Target = [u8];

    #[inline]
    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Bytes> for FormattedRecord {
    fn from(bytes: Bytes) -> Self {
        Self(bytes)
    }
}

impl From<&'static str> for FormattedRecord {
    fn from(s: &'static str) -> Self {
        Self(Bytes::from_static(s.as_bytes()))
    }
}

impl From<String> for FormattedRecord {
    fn from(s: String) -> Self {
        Self(Bytes::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_builder_and_lookup() {
        let record = FlowRecord::new()
            .with(8, FieldValue::Ip("10.0.0.1".parse().unwrap()))
            .with(4, FieldValue::Unsigned(6));

        assert_eq!(record.fields.len(), 2);
        assert_eq!(record.get(4), Some(&FieldValue::Unsigned(6)));
        assert_eq!(record.get(7), None);
    }

    #[test]
    fn test_record_json_shape() {
        let json = r#"{"fields":[{"id":4,"value":{"unsigned":17}},{"id":82,"value":{"str":"eth0"}}]}"#;
        let record: FlowRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.get(4), Some(&FieldValue::Unsigned(17)));
        assert_eq!(record.get(82), Some(&FieldValue::Str("eth0".to_string())));
    }

    #[test]
    fn test_formatted_record_shares_bytes() {
        let a = FormattedRecord::from("1,2,3\n");
        let b = a.clone();
        assert_eq!(a.as_bytes().as_ptr(), b.as_bytes().as_ptr());
        assert_eq!(b.len(), 6);
    }
}
