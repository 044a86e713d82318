//! RecordFormatter trait - record to text conversion interface

use bytes::BytesMut;

use crate::FlowRecord;

/// Converts a decoded record into its textual wire form.
///
/// Implementations append exactly one complete record (including its line
/// terminator) to `out`.
pub trait RecordFormatter {
    fn format(&self, record: &FlowRecord, out: &mut BytesMut);
}
