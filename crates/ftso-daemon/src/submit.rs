//! Transaction submission boundary.
//!
//! Key custody and broadcasting belong to an external signer service. The
//! daemon hands it finished calldata through [`Submitter`].

use std::sync::Arc;

use alloy_primitives::{Address, B256};
use async_trait::async_trait;
use ftso_types::ledger::ContractName;

use crate::ledger::DevLedger;
use crate::Result;

/// Sends calldata to a protocol contract.
#[async_trait]
pub trait Submitter: Send + Sync {
    /// Submit `input` to `contract`. Returns the transaction hash when the
    /// transaction was included.
    ///
    /// # Errors
    ///
    /// - [`crate::DaemonError::Submission`] if the transaction could not be
    ///   sent
    async fn submit(
        &self,
        contract: ContractName,
        function_name: &str,
        input: Vec<u8>,
    ) -> Result<Option<B256>>;
}

/// Includes transactions directly in the devnet ledger.
#[derive(Debug)]
pub struct LedgerSubmitter {
    ledger: Arc<DevLedger>,
    from: Address,
}

impl LedgerSubmitter {
    pub fn new(ledger: Arc<DevLedger>, from: Address) -> Self {
        Self { ledger, from }
    }
}

#[async_trait]
impl Submitter for LedgerSubmitter {
    async fn submit(
        &self,
        contract: ContractName,
        function_name: &str,
        input: Vec<u8>,
    ) -> Result<Option<B256>> {
        let hash = self
            .ledger
            .include_transaction(contract, function_name, self.from, input);
        tracing::debug!(from = %self.from, function = function_name, tx = %hash, "transaction included");
        Ok(Some(hash))
    }
}

/// Logs calldata instead of sending it.
#[derive(Debug)]
pub struct DryRunSubmitter {
    from: Address,
}

impl DryRunSubmitter {
    pub fn new(from: Address) -> Self {
        Self { from }
    }
}

#[async_trait]
impl Submitter for DryRunSubmitter {
    async fn submit(
        &self,
        contract: ContractName,
        function_name: &str,
        input: Vec<u8>,
    ) -> Result<Option<B256>> {
        tracing::info!(
            from = %self.from,
            %contract,
            function = function_name,
            calldata = %hex::encode(&input),
            "dry run: transaction not sent"
        );
        Ok(None)
    }
}
