//! In-memory ledger index.
//!
//! Holds blocks, events and transactions in insertion order. Used by tests
//! and as the shared ledger of the local devnet, where submissions are
//! appended directly.

use async_trait::async_trait;
use ftso_types::ledger::{ContractName, EventRecord, TxRecord};
use parking_lot::RwLock;

use crate::reader::{IndexReader, IndexedRange};
use crate::Result;

#[derive(Debug, Default)]
struct MemoryState {
    /// `(number, timestamp)` of every indexed block.
    blocks: Vec<(u64, u64)>,
    events: Vec<EventRecord>,
    transactions: Vec<TxRecord>,
}

/// Ledger index kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryIndex {
    state: RwLock<MemoryState>,
}

impl MemoryIndex {
    /// Create an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a block. Blocks must arrive in increasing order.
    pub fn add_block(&self, number: u64, timestamp: u64) {
        let mut state = self.state.write();
        match state.blocks.last().map(|(n, _)| *n) {
            Some(last) if last == number => {}
            Some(last) if last > number => {
                tracing::debug!(number, last, "ignoring out-of-order block");
            }
            _ => state.blocks.push((number, timestamp)),
        }
    }

    /// Append an event, recording its block if new.
    pub fn push_event(&self, record: EventRecord) {
        self.add_block(record.block_number, record.timestamp);
        self.state.write().events.push(record);
    }

    /// Append a transaction, recording its block if new.
    pub fn push_transaction(&self, record: TxRecord) {
        self.add_block(record.block_number, record.timestamp);
        self.state.write().transactions.push(record);
    }

    /// Latest block number and timestamp.
    pub fn latest_block(&self) -> Option<(u64, u64)> {
        self.state.read().blocks.last().copied()
    }

    /// Number of stored transactions.
    pub fn transaction_count(&self) -> usize {
        self.state.read().transactions.len()
    }
}

fn in_range(ts: u64, start: u64, end: Option<u64>) -> bool {
    ts >= start && end.map_or(true, |end| ts <= end)
}

#[async_trait]
impl IndexReader for MemoryIndex {
    async fn query_events(
        &self,
        contract: ContractName,
        event_name: &str,
        start: u64,
        end: Option<u64>,
    ) -> Result<Vec<EventRecord>> {
        let state = self.state.read();
        let mut out: Vec<EventRecord> = state
            .events
            .iter()
            .filter(|r| {
                r.event.contract() == contract
                    && r.event.name() == event_name
                    && in_range(r.timestamp, start, end)
            })
            .cloned()
            .collect();
        out.sort_by_key(|r| r.block_number);
        Ok(out)
    }

    async fn query_transactions(
        &self,
        contract: ContractName,
        function_name: &str,
        start: u64,
        end: Option<u64>,
    ) -> Result<Vec<TxRecord>> {
        let state = self.state.read();
        let mut out: Vec<TxRecord> = state
            .transactions
            .iter()
            .filter(|t| {
                t.contract == contract
                    && t.function_name == function_name
                    && in_range(t.timestamp, start, end)
            })
            .cloned()
            .collect();
        out.sort_by_key(|t| t.block_number);
        Ok(out)
    }

    async fn indexed_range(&self) -> Result<Option<IndexedRange>> {
        let state = self.state.read();
        Ok(match (state.blocks.first(), state.blocks.last()) {
            (Some((_, first)), Some((last_block, last))) => Some(IndexedRange {
                first_timestamp: *first,
                last_timestamp: *last,
                last_block: *last_block,
            }),
            _ => None,
        })
    }
}
