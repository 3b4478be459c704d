//! Asynchronous units of work issued to the host.

use crate::host::ContractCode;
use crate::types::{AccountId, Balance, Gas, PublicKey};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// One step of a [`PromiseBatch`]
#[derive(Clone, Debug)]
pub enum Action {
    /// Create the receiver account
    CreateAccount,
    /// Deploy contract code to the receiver
    DeployContract {
        /// Code to instantiate
        code: Arc<dyn ContractCode>,
    },
    /// Grant a full-access key on the receiver
    AddFullAccessKey {
        /// Key to add
        public_key: PublicKey,
    },
    /// Call a method on the receiver
    FunctionCall {
        /// Method name
        method_name: String,
        /// JSON-encoded arguments
        args: Vec<u8>,
        /// Deposit moved with the call
        deposit: Balance,
        /// Gas attached
        gas: Gas,
    },
    /// Move funds to the receiver
    Transfer {
        /// Amount
        deposit: Balance,
    },
}

impl Action {
    /// Short name for logs
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::CreateAccount => "create_account",
            Self::DeployContract { .. } => "deploy_contract",
            Self::AddFullAccessKey { .. } => "add_full_access_key",
            Self::FunctionCall { .. } => "function_call",
            Self::Transfer { .. } => "transfer",
        }
    }
}

/// An ordered list of actions against a single receiver
///
/// The host runs the actions in order and stops at the first failure.
#[derive(Clone, Debug)]
pub struct PromiseBatch {
    /// Account the actions apply to
    pub receiver_id: AccountId,
    /// Actions in execution order
    pub actions: Vec<Action>,
}

impl PromiseBatch {
    /// Empty batch for `receiver_id`
    #[must_use]
    pub const fn new(receiver_id: AccountId) -> Self {
        Self {
            receiver_id,
            actions: Vec::new(),
        }
    }

    /// Append [`Action::CreateAccount`]
    #[must_use]
    pub fn create_account(mut self) -> Self {
        self.actions.push(Action::CreateAccount);
        self
    }

    /// Append [`Action::DeployContract`]
    #[must_use]
    pub fn deploy_contract(mut self, code: Arc<dyn ContractCode>) -> Self {
        self.actions.push(Action::DeployContract { code });
        self
    }

    /// Append [`Action::AddFullAccessKey`]
    #[must_use]
    pub fn add_full_access_key(mut self, public_key: PublicKey) -> Self {
        self.actions.push(Action::AddFullAccessKey { public_key });
        self
    }

    /// Append [`Action::FunctionCall`] with JSON-encoded arguments
    ///
    /// # Errors
    ///
    /// Returns the encoder error if `args` cannot be serialized.
    pub fn function_call<T: Serialize>(
        mut self,
        method_name: impl Into<String>,
        args: &T,
        deposit: Balance,
        gas: Gas,
    ) -> Result<Self, serde_json::Error> {
        self.actions.push(Action::FunctionCall {
            method_name: method_name.into(),
            args: serde_json::to_vec(args)?,
            deposit,
            gas,
        });
        Ok(self)
    }

    /// Append [`Action::Transfer`]
    #[must_use]
    pub fn transfer(mut self, deposit: Balance) -> Self {
        self.actions.push(Action::Transfer { deposit });
        self
    }

    /// Sum of every deposit the batch moves, saturating
    #[must_use]
    pub fn total_deposit(&self) -> Balance {
        self.actions
            .iter()
            .map(|action| match action {
                Action::FunctionCall { deposit, .. } | Action::Transfer { deposit } => *deposit,
                _ => Balance::ZERO,
            })
            .fold(Balance::ZERO, Balance::saturating_add)
    }
}

/// Outcome of a promise as seen by a chained callback
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PromiseResult {
    /// Not resolved yet
    Pending,
    /// Resolved with the return value of the last action
    Successful(Vec<u8>),
    /// An action failed
    Failed,
}

impl PromiseResult {
    /// True for [`PromiseResult::Successful`]
    #[must_use]
    pub const fn is_successful(&self) -> bool {
        matches!(self, Self::Successful(_))
    }
}
