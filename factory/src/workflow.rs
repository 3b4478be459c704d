//! Deployment workflow records.
//!
//! ```text
//! Requested ──► Deploying ──► Confirmed
//!                   │
//!                   └───────► Failed ──► (re-requested)
//! ```
//!
//! A record is written per event name when `create_event` is accepted and is
//! resolved by the `on_event_created` callback. Only `Confirmed` adds the
//! name to the registry.

use crate::error::{FactoryError, Result};
use gala_chain::{AccountId, Balance, PersistentMap, PersistentSet, Timestamp};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Names of successfully created events
pub const REGISTRY: PersistentSet<String> = PersistentSet::new("ev");

/// Workflow record per event name
pub const DEPLOYMENTS: PersistentMap<String, Deployment> = PersistentMap::new("dp");

/// Where a deployment is in its lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeploymentStatus {
    /// Accepted, batch not yet issued
    Requested,
    /// Batch issued, callback outstanding
    Deploying,
    /// Event live and registered
    Confirmed,
    /// Batch failed; the name may be requested again
    Failed,
}

impl DeploymentStatus {
    /// Whether `self → next` is a legal step
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Requested, Self::Deploying)
                | (Self::Deploying, Self::Confirmed | Self::Failed)
        )
    }

    /// Whether a deployment in this status blocks a new request for the name
    #[must_use]
    pub const fn is_in_flight(self) -> bool {
        matches!(self, Self::Requested | Self::Deploying)
    }
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Requested => "requested",
            Self::Deploying => "deploying",
            Self::Confirmed => "confirmed",
            Self::Failed => "failed",
        })
    }
}

/// One attempt to create an event
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Deployment {
    /// Requested event name
    pub name: String,
    /// Full sub-account id
    pub account_id: AccountId,
    /// Block time of the request
    pub requested_at: Timestamp,
    /// Deposit forwarded to `initialize`
    pub deposit: Balance,
    /// Current status
    pub status: DeploymentStatus,
    /// Block time of the callback that confirmed or failed it
    pub resolved_at: Option<Timestamp>,
}

impl Deployment {
    /// A freshly accepted request
    #[must_use]
    pub const fn requested(
        name: String,
        account_id: AccountId,
        requested_at: Timestamp,
        deposit: Balance,
    ) -> Self {
        Self {
            name,
            account_id,
            requested_at,
            deposit,
            status: DeploymentStatus::Requested,
            resolved_at: None,
        }
    }

    /// Move to `next`
    ///
    /// # Errors
    ///
    /// [`FactoryError::InvalidTransition`] for an illegal step.
    pub fn transition(&mut self, next: DeploymentStatus) -> Result<()> {
        if !self.status.can_transition_to(next) {
            return Err(FactoryError::InvalidTransition {
                from: self.status,
                to: next,
            });
        }
        self.status = next;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use DeploymentStatus::{Confirmed, Deploying, Failed, Requested};

    fn deployment() -> Deployment {
        Deployment::requested(
            "party".to_string(),
            AccountId::new("party.factory.testnet").unwrap(),
            Timestamp::from_nanos(1),
            Balance::from_near(3),
        )
    }

    #[test]
    fn happy_path() {
        let mut d = deployment();
        d.transition(Deploying).unwrap();
        d.transition(Confirmed).unwrap();
        assert_eq!(d.status, Confirmed);
    }

    #[test]
    fn terminal_states_are_final() {
        for terminal in [Confirmed, Failed] {
            for next in [Requested, Deploying, Confirmed, Failed] {
                assert!(!terminal.can_transition_to(next));
            }
        }
    }

    #[test]
    fn cannot_skip_deploying() {
        let mut d = deployment();
        assert_eq!(
            d.transition(Confirmed),
            Err(FactoryError::InvalidTransition {
                from: Requested,
                to: Confirmed
            })
        );
        assert_eq!(d.status, Requested);
    }

    #[test]
    fn in_flight() {
        assert!(Requested.is_in_flight());
        assert!(Deploying.is_in_flight());
        assert!(!Confirmed.is_in_flight());
        assert!(!Failed.is_in_flight());
    }

    #[test]
    fn status_json() {
        assert_eq!(serde_json::to_string(&Deploying).unwrap(), r#""deploying""#);
    }
}
