//! Seams between contract code and the platform.

use crate::config::ChainConfig;
use crate::context::CallContext;
use crate::promise::{PromiseBatch, PromiseResult};
use crate::types::{AccountId, Timestamp};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Boxed `Send` future used across the trait objects below
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The platform as seen by a contract that issues promises
pub trait Host: Send + Sync {
    /// Execute `batch` on behalf of `predecessor` in a transaction signed by `signer`
    ///
    /// Resolves once every action has run, or with [`PromiseResult::Failed`]
    /// at the first failing action. Actions that already ran are not undone.
    fn execute(
        &self,
        predecessor: AccountId,
        signer: AccountId,
        batch: PromiseBatch,
    ) -> BoxFuture<'_, PromiseResult>;

    /// Current block time
    ///
    /// Callbacks scheduled after a batch resolves run at this time, not at
    /// the time the batch was issued.
    fn block_timestamp(&self) -> Timestamp;
}

/// Errors surfaced to the caller of a contract method
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ContractError {
    /// No such method
    #[error("Method {0} not found")]
    MethodNotFound(String),

    /// Arguments did not decode
    #[error("Invalid arguments for {method}: {reason}")]
    InvalidArguments {
        /// Method name
        method: String,
        /// Decoder message
        reason: String,
    },

    /// The method aborted
    #[error("Smart contract panicked: {0}")]
    Execution(String),

    /// The contract instance is no longer accepting calls
    #[error("Contract unavailable: {0}")]
    Unavailable(String),
}

impl ContractError {
    /// Build [`ContractError::InvalidArguments`]
    #[must_use]
    pub fn invalid_arguments(method: &str, reason: impl fmt::Display) -> Self {
        Self::InvalidArguments {
            method: method.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Return value of a contract call
///
/// `settled` resolves once every effect the call started has finished
/// (transfers, deployments, callbacks). Hosts that want to observe the full
/// receipt tree await it; callers that only want the return value drop it.
pub struct CallOutcome {
    /// JSON-encoded return value
    pub return_value: Vec<u8>,
    /// Completion of the work the call started
    pub settled: Option<BoxFuture<'static, ()>>,
}

impl CallOutcome {
    /// Encode `value` as the return value
    ///
    /// # Errors
    ///
    /// Returns [`ContractError::Execution`] if `value` cannot be serialized.
    pub fn json<T: Serialize>(value: &T) -> Result<Self, ContractError> {
        let return_value =
            serde_json::to_vec(value).map_err(|e| ContractError::Execution(e.to_string()))?;
        Ok(Self {
            return_value,
            settled: None,
        })
    }

    /// Outcome with no return value
    #[must_use]
    pub fn unit() -> Self {
        Self {
            return_value: b"null".to_vec(),
            settled: None,
        }
    }

    /// Attach the completion of the call's effects
    #[must_use]
    pub fn with_settlement(mut self, settled: BoxFuture<'static, ()>) -> Self {
        self.settled = Some(settled);
        self
    }

    /// Decode the return value
    ///
    /// # Errors
    ///
    /// Returns the decoder error if the value is not a `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.return_value)
    }
}

impl fmt::Debug for CallOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallOutcome")
            .field("return_value", &String::from_utf8_lossy(&self.return_value))
            .field("settled", &self.settled.as_ref().map(|_| "<future>"))
            .finish()
    }
}

/// A deployed contract instance
pub trait Contract: Send + Sync {
    /// Invoke a change method
    fn call<'a>(
        &'a self,
        context: CallContext,
        method: &'a str,
        args: &'a [u8],
    ) -> BoxFuture<'a, Result<CallOutcome, ContractError>>;

    /// Invoke a read-only method; state is never modified
    fn view<'a>(
        &'a self,
        context: CallContext,
        method: &'a str,
        args: &'a [u8],
    ) -> BoxFuture<'a, Result<Vec<u8>, ContractError>>;

    /// Stop accepting calls and give in-flight promises `timeout` to resolve
    ///
    /// Calls made afterwards fail with [`ContractError::Unavailable`].
    fn shutdown(&self, timeout: Duration) -> BoxFuture<'_, Result<(), ContractError>>;
}

/// What a contract instance receives when its code is deployed
#[derive(Clone)]
pub struct Deployment {
    /// Account the code is deployed to
    pub account_id: AccountId,
    /// Platform handle for issuing promises
    pub host: Arc<dyn Host>,
    /// Platform limits
    pub config: ChainConfig,
}

impl fmt::Debug for Deployment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Deployment")
            .field("account_id", &self.account_id)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Deployable contract code
pub trait ContractCode: Send + Sync + fmt::Debug {
    /// Code identifier for logs
    fn name(&self) -> &str;

    /// Create a fresh instance with empty storage
    fn instantiate(&self, deployment: Deployment) -> Arc<dyn Contract>;
}
