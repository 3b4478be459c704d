//! Per-call context supplied by the host.

use crate::constants::XCC_GAS;
use crate::promise::PromiseResult;
use crate::types::{AccountId, Balance, Gas, PublicKey, Timestamp};
use serde::{Deserialize, Serialize};

/// Everything the host tells a contract about the current invocation
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallContext {
    /// The contract being called
    pub current_account_id: AccountId,
    /// Immediate caller (an account, or a contract for cross-contract calls)
    pub predecessor_account_id: AccountId,
    /// Account that signed the originating transaction
    pub signer_account_id: AccountId,
    /// Public key of the transaction signer
    pub signer_account_pk: PublicKey,
    /// Amount attached to this call
    pub attached_deposit: Balance,
    /// Block time of the receipt
    pub block_timestamp: Timestamp,
    /// Gas available to the call
    pub prepaid_gas: Gas,
    /// Results of the promises this call was chained on, in order
    pub promise_results: Vec<PromiseResult>,
}

impl CallContext {
    /// A plain call signed by the predecessor, with no deposit and no promise results
    #[must_use]
    pub fn new(
        current_account_id: AccountId,
        predecessor_account_id: AccountId,
        block_timestamp: Timestamp,
    ) -> Self {
        let signer_account_pk = PublicKey::new(format!("ed25519:{predecessor_account_id}"));
        Self {
            current_account_id,
            signer_account_id: predecessor_account_id.clone(),
            predecessor_account_id,
            signer_account_pk,
            attached_deposit: Balance::ZERO,
            block_timestamp,
            prepaid_gas: XCC_GAS,
            promise_results: Vec::new(),
        }
    }

    /// Attach a deposit
    #[must_use]
    pub const fn with_deposit(mut self, deposit: Balance) -> Self {
        self.attached_deposit = deposit;
        self
    }

    /// Attribute the call to a transaction signed by `signer`
    ///
    /// Also resets the signer key to `signer`'s default key.
    #[must_use]
    pub fn with_signer(mut self, signer: AccountId) -> Self {
        self.signer_account_pk = PublicKey::new(format!("ed25519:{signer}"));
        self.signer_account_id = signer;
        self
    }

    /// Override the signer key
    #[must_use]
    pub fn with_signer_pk(mut self, key: PublicKey) -> Self {
        self.signer_account_pk = key;
        self
    }

    /// Override the prepaid gas
    #[must_use]
    pub const fn with_prepaid_gas(mut self, gas: Gas) -> Self {
        self.prepaid_gas = gas;
        self
    }

    /// Deliver promise results (callbacks)
    #[must_use]
    pub fn with_promise_results(mut self, results: Vec<PromiseResult>) -> Self {
        self.promise_results = results;
        self
    }

    /// True when the contract is calling itself
    #[must_use]
    pub fn is_self_call(&self) -> bool {
        self.predecessor_account_id == self.current_account_id
    }
}
