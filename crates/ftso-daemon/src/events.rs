//! Round event broadcasting.
//!
//! Every voter task publishes its progress on one bus. Subscribers that fall
//! more than the channel capacity behind lose the oldest events.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use alloy_primitives::{Address, B256};
use ftso_types::VotingRoundId;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity.
pub const DEFAULT_CAPACITY: usize = 1000;

/// Progress of one voter through one voting round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum RoundEvent {
    CommitSubmitted {
        voter: Address,
        voting_round: VotingRoundId,
    },
    RevealSubmitted {
        voter: Address,
        voting_round: VotingRoundId,
    },
    ResultSigned {
        voter: Address,
        voting_round: VotingRoundId,
        merkle_root: B256,
        is_secure: bool,
    },
    /// The round was finalized, by this voter (`by_self`) or someone else.
    RoundFinalized {
        voter: Address,
        voting_round: VotingRoundId,
        merkle_root: B256,
        by_self: bool,
    },
    FinalizationTimedOut {
        voter: Address,
        voting_round: VotingRoundId,
    },
}

impl RoundEvent {
    /// Round the event belongs to.
    pub fn voting_round(&self) -> VotingRoundId {
        match self {
            RoundEvent::CommitSubmitted { voting_round, .. }
            | RoundEvent::RevealSubmitted { voting_round, .. }
            | RoundEvent::ResultSigned { voting_round, .. }
            | RoundEvent::RoundFinalized { voting_round, .. }
            | RoundEvent::FinalizationTimedOut { voting_round, .. } => *voting_round,
        }
    }

    /// Signing address of the voter that emitted the event.
    pub fn voter(&self) -> Address {
        match self {
            RoundEvent::CommitSubmitted { voter, .. }
            | RoundEvent::RevealSubmitted { voter, .. }
            | RoundEvent::ResultSigned { voter, .. }
            | RoundEvent::RoundFinalized { voter, .. }
            | RoundEvent::FinalizationTimedOut { voter, .. } => *voter,
        }
    }
}

/// Event bus for broadcasting round events to subscribers.
#[derive(Clone, Debug)]
pub struct EventBus {
    sender: broadcast::Sender<RoundEvent>,
    sequence: Arc<AtomicU64>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl EventBus {
    /// Create a new event bus with the given buffer capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            sequence: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Emit an event to all subscribers.
    pub fn emit(&self, event: RoundEvent) {
        self.sequence.fetch_add(1, Ordering::SeqCst);
        // no subscribers is fine
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<RoundEvent> {
        self.sender.subscribe()
    }

    /// Number of events emitted so far.
    pub fn sequence(&self) -> u64 {
        self.sequence.load(Ordering::SeqCst)
    }
}
