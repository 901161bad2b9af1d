//! In-process ledger of the devnet.
//!
//! Wraps a [`MemoryIndex`] and plays the role of the chain: it produces
//! blocks with increasing numbers, includes submission transactions and
//! emits registration events. Block production is serialized by one lock,
//! so block numbers and timestamps never go backwards.

use std::sync::Arc;

use alloy_primitives::{Address, B256, U256};
use ftso_crypto::abi::{encode, Token};
use ftso_crypto::hash::keccak256;
use ftso_index::MemoryIndex;
use ftso_types::ledger::{ContractName, EventRecord, LedgerEvent, TxRecord};
use parking_lot::Mutex;

use crate::clock::Clock;

/// Address the devnet assigns to a protocol contract.
pub fn contract_address(contract: ContractName) -> Address {
    let tag = match contract {
        ContractName::Submission => 0x51,
        ContractName::SystemsManager => 0x52,
        ContractName::VoterRegistry => 0x53,
        ContractName::RewardOffers => 0x54,
    };
    Address::repeat_byte(tag)
}

#[derive(Debug)]
struct Producer {
    next_block: u64,
    last_timestamp: u64,
    nonce: u64,
}

/// Simulated chain backed by a shared [`MemoryIndex`].
#[derive(Debug)]
pub struct DevLedger {
    index: Arc<MemoryIndex>,
    clock: Clock,
    producer: Mutex<Producer>,
}

impl DevLedger {
    pub fn new(index: Arc<MemoryIndex>, clock: Clock) -> Self {
        Self {
            index,
            clock,
            producer: Mutex::new(Producer {
                next_block: 1,
                last_timestamp: 0,
                nonce: 0,
            }),
        }
    }

    /// The index every voter reads.
    pub fn index(&self) -> &Arc<MemoryIndex> {
        &self.index
    }

    pub fn clock(&self) -> Clock {
        self.clock
    }

    fn next_block(producer: &mut Producer, timestamp: u64) -> (u64, u64) {
        let timestamp = timestamp.max(producer.last_timestamp);
        let number = producer.next_block;
        producer.next_block += 1;
        producer.last_timestamp = timestamp;
        (number, timestamp)
    }

    /// Produce an empty block at the current time.
    pub fn mine_block(&self) -> u64 {
        self.mine_block_at(self.clock.now())
    }

    /// Produce an empty block at `timestamp` (clamped to be monotonic).
    pub fn mine_block_at(&self, timestamp: u64) -> u64 {
        let mut producer = self.producer.lock();
        let (number, timestamp) = Self::next_block(&mut producer, timestamp);
        self.index.add_block(number, timestamp);
        number
    }

    /// Emit events in one new block at `timestamp`, in the given order.
    pub fn emit_events_at(&self, timestamp: u64, events: Vec<LedgerEvent>) -> u64 {
        let mut producer = self.producer.lock();
        let (number, timestamp) = Self::next_block(&mut producer, timestamp);
        self.index.add_block(number, timestamp);
        for event in events {
            self.index.push_event(EventRecord {
                block_number: number,
                timestamp,
                event,
            });
        }
        number
    }

    /// Include a successful transaction in a new block at the current time.
    pub fn include_transaction(
        &self,
        contract: ContractName,
        function_name: &str,
        from: Address,
        input: Vec<u8>,
    ) -> B256 {
        let mut producer = self.producer.lock();
        let (number, timestamp) = Self::next_block(&mut producer, self.clock.now());
        producer.nonce += 1;
        let hash = keccak256(encode(&[
            Token::Address(from),
            Token::Uint(U256::from(producer.nonce)),
            Token::Bytes(input.clone()),
        ]));
        self.index.push_transaction(TxRecord {
            hash,
            contract,
            function_name: function_name.to_string(),
            input,
            from,
            to: contract_address(contract),
            block_number: number,
            status: true,
            timestamp,
        });
        hash
    }
}
