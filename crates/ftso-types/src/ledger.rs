//! Decoded ledger events and transaction records.
//!
//! These are the records the ledger index hands back to the protocol. The
//! ledger history is append-only: a record, once indexed, never changes.

use std::fmt;
use std::str::FromStr;

use alloy_primitives::{Address, B256};
use serde::{Deserialize, Serialize};

use crate::voting::{CommunityOffer, InflationOffer, SigningPolicy, VoterRegistration};
use crate::TypesError;

/// Contracts the data provider reads from or submits to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContractName {
    /// Receives commits, reveals, result signatures and finalizations.
    Submission,
    /// Publishes signing policies.
    SystemsManager,
    /// Publishes voter registrations.
    VoterRegistry,
    /// Publishes inflation and community reward offers.
    RewardOffers,
}

impl ContractName {
    /// Canonical contract name.
    pub fn as_str(&self) -> &'static str {
        match self {
            ContractName::Submission => "Submission",
            ContractName::SystemsManager => "SystemsManager",
            ContractName::VoterRegistry => "VoterRegistry",
            ContractName::RewardOffers => "RewardOffers",
        }
    }
}

impl fmt::Display for ContractName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContractName {
    type Err = TypesError;

    fn from_str(s: &str) -> crate::Result<Self> {
        match s {
            "Submission" => Ok(ContractName::Submission),
            "SystemsManager" => Ok(ContractName::SystemsManager),
            "VoterRegistry" => Ok(ContractName::VoterRegistry),
            "RewardOffers" => Ok(ContractName::RewardOffers),
            other => Err(TypesError::UnknownContract(other.to_string())),
        }
    }
}

/// Event names as indexed.
pub mod event_names {
    pub const SIGNING_POLICY_INITIALIZED: &str = "SigningPolicyInitialized";
    pub const VOTER_REGISTERED: &str = "VoterRegistered";
    pub const INFLATION_REWARDS_OFFERED: &str = "InflationRewardsOffered";
    pub const REWARDS_OFFERED: &str = "RewardsOffered";
}

/// Function names of the submission contract.
pub mod function_names {
    pub const COMMIT: &str = "commit";
    pub const REVEAL: &str = "reveal";
    pub const SIGN_RESULT: &str = "signResult";
    pub const FINALIZE: &str = "finalize";
}

/// A decoded contract event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum LedgerEvent {
    SigningPolicyInitialized(SigningPolicy),
    VoterRegistered(VoterRegistration),
    InflationRewardsOffered(InflationOffer),
    RewardsOffered(CommunityOffer),
}

impl LedgerEvent {
    /// Indexed event name.
    pub fn name(&self) -> &'static str {
        match self {
            LedgerEvent::SigningPolicyInitialized(_) => event_names::SIGNING_POLICY_INITIALIZED,
            LedgerEvent::VoterRegistered(_) => event_names::VOTER_REGISTERED,
            LedgerEvent::InflationRewardsOffered(_) => event_names::INFLATION_REWARDS_OFFERED,
            LedgerEvent::RewardsOffered(_) => event_names::REWARDS_OFFERED,
        }
    }

    /// Contract that emits this event.
    pub fn contract(&self) -> ContractName {
        match self {
            LedgerEvent::SigningPolicyInitialized(_) => ContractName::SystemsManager,
            LedgerEvent::VoterRegistered(_) => ContractName::VoterRegistry,
            LedgerEvent::InflationRewardsOffered(_) | LedgerEvent::RewardsOffered(_) => {
                ContractName::RewardOffers
            }
        }
    }
}

/// An indexed event together with its block position.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Block the event was emitted in.
    pub block_number: u64,
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
    /// Decoded event.
    pub event: LedgerEvent,
}

/// An indexed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    /// Transaction hash.
    pub hash: B256,
    /// Target contract.
    pub contract: ContractName,
    /// Called function name.
    pub function_name: String,
    /// Raw calldata including the 4-byte selector.
    #[serde(with = "crate::voting::hex_bytes")]
    pub input: Vec<u8>,
    /// Sender.
    pub from: Address,
    /// Recipient (contract address).
    pub to: Address,
    /// Block the transaction was included in.
    pub block_number: u64,
    /// `true` when the transaction succeeded.
    pub status: bool,
    /// Block timestamp (Unix seconds).
    pub timestamp: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contract_name_roundtrip() {
        for c in [
            ContractName::Submission,
            ContractName::SystemsManager,
            ContractName::VoterRegistry,
            ContractName::RewardOffers,
        ] {
            assert_eq!(c.as_str().parse::<ContractName>().expect("parse"), c);
        }
        assert!("Relay".parse::<ContractName>().is_err());
    }

    #[test]
    fn test_event_contract_and_name() {
        let offer = LedgerEvent::RewardsOffered(CommunityOffer {
            reward_epoch_id: 1,
            feed: crate::Feed::new(crate::FeedId::from_name(1, "BTC/USD"), 2),
            amount: 10,
            offerer: Address::ZERO,
        });
        assert_eq!(offer.name(), "RewardsOffered");
        assert_eq!(offer.contract(), ContractName::RewardOffers);
    }

    #[test]
    fn test_event_json_is_tagged() {
        let event = LedgerEvent::InflationRewardsOffered(InflationOffer {
            reward_epoch_id: 2,
            feeds: vec![],
            amount: 5,
        });
        let json = serde_json::to_value(&event).expect("serialize");
        assert_eq!(json["type"], "InflationRewardsOffered");
        let back: LedgerEvent = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, event);
    }
}
