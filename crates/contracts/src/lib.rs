//! # Contracts
//!
//! Frozen interface contracts, defining inter-module data structures and traits.
//! All business crates can only depend on this crate, reverse dependencies are prohibited.
//!
//! ## Data Flow
//! - `FlowRecord` (decoded) is formatted once into a `FormattedRecord`
//! - every registered `DataSink` receives the same `FormattedRecord`

mod blueprint;
mod error;
mod format;
mod record;
mod sink;
mod sparse_map;

pub use blueprint::*;
pub use error::*;
pub use format::RecordFormatter;
pub use record::*;
pub use sink::*;
pub use sparse_map::SparseIdMap;
