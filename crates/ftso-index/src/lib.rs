//! # ftso-index
//!
//! Read access to the append-only ledger index.
//!
//! The protocol never talks to a chain node directly. It reads decoded
//! events and transactions from an index that follows the chain, and asks
//! the index whether a time range is fully covered before trusting the
//! answer to a range query.
//!
//! ## Modules
//!
//! - [`reader`] — The [`IndexReader`] trait
//! - [`range`] — Range completeness checks and the [`RangeWaiter`] polling driver
//! - [`memory`] — In-memory index for tests and the local devnet
//! - [`sqlite`] — SQLite-backed index
//! - [`schema`] — SQLite schema
//! - [`migrations`] — Forward-only schema migrations

pub mod memory;
pub mod migrations;
pub mod range;
pub mod reader;
pub mod schema;
pub mod sqlite;

pub use memory::MemoryIndex;
pub use range::{RangeStatus, RangeWaiter};
pub use reader::{IndexReader, IndexedRange};
pub use sqlite::SqliteIndex;

/// Current SQLite schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Error types for ledger index access.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// SQLite failure.
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// Schema migration failure.
    #[error("migration failed: {0}")]
    Migration(String),

    /// A stored record could not be (de)serialized.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A block number or timestamp does not fit a SQLite integer.
    #[error("{field} {value} exceeds the SQLite integer range")]
    OutOfRange {
        /// Which column the value was meant for.
        field: &'static str,
        /// Offending value.
        value: u64,
    },

    /// The index does not (yet) cover the requested time range.
    #[error("range [{start}, {end}] not indexed")]
    RangeNotIndexed {
        /// Inclusive range start.
        start: u64,
        /// Inclusive range end.
        end: u64,
    },
}

impl From<serde_json::Error> for IndexError {
    fn from(e: serde_json::Error) -> Self {
        IndexError::Serialization(e.to_string())
    }
}

/// Convenience result type for index access.
pub type Result<T> = std::result::Result<T, IndexError>;
