//! Error types for the factory contract.

use crate::workflow::DeploymentStatus;
use gala_chain::{Balance, StorageError};
use thiserror::Error;

/// Reasons a factory call is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FactoryError {
    /// Name is not a single segment or the sub-account id is invalid
    #[error("Event name must be valid NEAR account name")]
    InvalidName {
        /// Rejected name
        name: String,
    },

    /// Name is registered or its deployment is in flight
    #[error("Event name already exists")]
    NameTaken {
        /// Requested name
        name: String,
    },

    /// Deposit does not cover the new account's minimum balance
    #[error("MIN_ACCOUNT_BALANCE must be attached to initialize")]
    InsufficientDeposit {
        /// Attached amount
        attached: Balance,
        /// Required amount
        required: Balance,
    },

    /// Callback invoked by someone other than the factory
    #[error("Only the factory can perform this action")]
    Unauthorized,

    /// Workflow record asked to move backwards or skip a step
    #[error("Deployment cannot move from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: DeploymentStatus,
        /// Requested status
        to: DeploymentStatus,
    },

    /// Cross-contract arguments could not be encoded
    #[error("Failed to encode arguments: {0}")]
    Encode(String),

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for factory operations
pub type Result<T> = std::result::Result<T, FactoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn messages() {
        let invalid = FactoryError::InvalidName {
            name: "_".to_string(),
        };
        assert_eq!(invalid.to_string(), "Event name must be valid NEAR account name");

        let transition = FactoryError::InvalidTransition {
            from: DeploymentStatus::Confirmed,
            to: DeploymentStatus::Deploying,
        };
        assert_eq!(transition.to_string(), "Deployment cannot move from confirmed to deploying");
    }
}
