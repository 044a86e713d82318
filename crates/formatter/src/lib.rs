//! # Formatter
//!
//! Record to DSV text conversion.
//!
//! Responsibilities:
//! - Render `FlowRecord` values in record order, joined by the configured delimiter
//! - Resolve element semantics (protocol, TCP flags) through a `FieldDictionary`

mod dictionary;
mod dsv;

pub use contracts::RecordFormatter;
pub use dictionary::{FieldDef, FieldDictionary, Semantic};
pub use dsv::DsvFormatter;
