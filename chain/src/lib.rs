//! # Gala Chain
//!
//! The host platform as seen from inside a contract.
//!
//! The contracts never talk to a blockchain directly. Everything they need
//! from the platform is defined here:
//!
//! - identities, amounts, and time ([`AccountId`], [`Balance`], [`Timestamp`], [`Gas`])
//! - the per-call context the host hands to every invocation ([`CallContext`])
//! - persistent key-value storage with singleton records and sets ([`storage`])
//! - asynchronous units of work and their results ([`PromiseBatch`], [`PromiseResult`])
//! - the seams between contract code and the platform ([`Host`], [`Contract`], [`ContractCode`])
//!
//! The testing crate provides an in-memory sandbox that implements [`Host`].

pub mod config;
pub mod constants;
pub mod context;
pub mod host;
pub mod promise;
pub mod storage;
pub mod types;

pub use config::ChainConfig;
pub use context::CallContext;
pub use host::{BoxFuture, CallOutcome, Contract, ContractCode, ContractError, Deployment, Host};
pub use promise::{Action, PromiseBatch, PromiseResult};
pub use storage::{PersistentMap, PersistentSet, Storage, StorageError, Trie};
pub use types::{AccountId, AccountIdError, Balance, Gas, PublicKey, Timestamp};
