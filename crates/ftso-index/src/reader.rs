//! The ledger index read interface.

use async_trait::async_trait;
use ftso_types::ledger::{ContractName, EventRecord, TxRecord};
use serde::{Deserialize, Serialize};

use crate::Result;

/// Block timestamps currently covered by an index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexedRange {
    /// Timestamp of the earliest indexed block.
    pub first_timestamp: u64,
    /// Timestamp of the latest indexed block.
    pub last_timestamp: u64,
    /// Number of the latest indexed block.
    pub last_block: u64,
}

impl IndexedRange {
    /// Whether the index holds a block strictly before `start` and one
    /// strictly after `end`, so that nothing in `[start, end]` can still
    /// appear.
    pub fn covers(&self, start: u64, end: u64) -> bool {
        self.first_timestamp < start && self.last_timestamp > end
    }
}

/// Read-only, time-ranged access to decoded ledger history.
///
/// Time ranges are inclusive Unix-second bounds on the block timestamp;
/// `end = None` means "up to the latest indexed block". Results are ordered
/// by block number, then by position within the block. History is
/// append-only, so a query over a covered range always returns the same
/// records.
#[async_trait]
pub trait IndexReader: Send + Sync {
    /// Events of `contract` named `event_name` within the time range.
    async fn query_events(
        &self,
        contract: ContractName,
        event_name: &str,
        start: u64,
        end: Option<u64>,
    ) -> Result<Vec<EventRecord>>;

    /// Transactions to `contract` calling `function_name` within the time
    /// range.
    async fn query_transactions(
        &self,
        contract: ContractName,
        function_name: &str,
        start: u64,
        end: Option<u64>,
    ) -> Result<Vec<TxRecord>>;

    /// Currently indexed block span, `None` while the index is empty.
    async fn indexed_range(&self) -> Result<Option<IndexedRange>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_covers_is_strict() {
        let range = IndexedRange {
            first_timestamp: 100,
            last_timestamp: 200,
            last_block: 10,
        };
        assert!(range.covers(101, 199));
        assert!(!range.covers(100, 150));
        assert!(!range.covers(150, 200));
        assert!(!range.covers(50, 150));
    }
}
