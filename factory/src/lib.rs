//! # Gala Factory
//!
//! Deploys event contracts to sub-accounts of the factory and keeps a
//! registry of the ones that came up.
//!
//! `create_event` is asynchronous: it returns once the deployment batch has
//! been issued. The name is registered only when the `on_event_created`
//! callback observes a successful batch; [`get_deployment`](operations::get_deployment)
//! exposes the workflow record in the meantime.

pub mod contract;
pub mod error;
pub mod operations;
pub mod reducer;
pub mod workflow;

pub use contract::{FactoryCode, FactoryContract, FactoryQuery};
pub use error::FactoryError;
pub use reducer::{FactoryAction, FactoryCall, FactoryEnvironment, FactoryReducer, FactoryState};
pub use workflow::{Deployment, DeploymentStatus};
