//! Error types for the event contract.

use gala_chain::{Balance, StorageError};
use std::fmt;
use thiserror::Error;

/// Who a guarded action is reserved for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The account that initialized the event
    Host,
    /// The host or one of the cohosts
    Cohost,
    /// Anyone who is not host, cohost, or guest
    Outsider,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Host => "Only the host can perform this action",
            Self::Cohost => "Only one of the hosts can perform this action",
            Self::Outsider => "Only someone not attending can perform this action",
        })
    }
}

/// Visibility phase an action requires
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Before `go_public`
    Private,
    /// After `go_public`
    Public,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Private => "This action can only be done before the event goes public",
            Self::Public => "The event must be public to perform this action",
        })
    }
}

/// Reasons event details are rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DetailsError {
    /// Date is not after the current block time
    #[error("The date must be upcoming")]
    DateNotUpcoming,

    /// Empty location
    #[error("A location is required")]
    MissingLocation,

    /// Empty title
    #[error("A title is required")]
    MissingTitle,

    /// Empty description
    #[error("A description is required")]
    MissingDescription,
}

/// Event contract errors
///
/// Every variant aborts the call and discards its changes.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EventError {
    /// `initialize` called twice
    #[error("Contract is already initialized")]
    AlreadyInitialized,

    /// Any method other than `initialize` before it succeeded
    #[error("Contract must be initialized first")]
    NotInitialized,

    /// `initialize` without the minimum account balance attached
    #[error("MIN_ACCOUNT_BALANCE must be attached to initialize")]
    InsufficientDeposit {
        /// Deposit attached
        attached: Balance,
        /// Deposit required
        required: Balance,
    },

    /// `buy_ticket` with less than the ticket price attached
    #[error("You must pay the ticket price")]
    InsufficientPayment {
        /// Deposit attached
        attached: Balance,
        /// Ticket price
        price: Balance,
    },

    /// Details failed validation
    #[error(transparent)]
    InvalidDetails(#[from] DetailsError),

    /// Caller lacks the required role
    #[error("{0}")]
    Unauthorized(Role),

    /// The event date has been reached
    #[error("This action can only be done before the event date")]
    EventEnded,

    /// `pay_hosts` before the event date
    #[error("The event must have passed to pay the hosts")]
    EventNotEnded,

    /// Wrong visibility phase
    #[error("{0}")]
    InvalidState(Phase),

    /// Caller already holds a ticket
    #[error("You already have a ticket")]
    AlreadyTicketed,

    /// Capacity reached
    #[error("This event is sold out")]
    SoldOut,

    /// Nothing to pay out
    #[error("This event had no ticket revenue")]
    NoRevenue,

    /// Payout already issued
    #[error("The hosts have already been paid")]
    AlreadyPaid,

    /// Ticket revenue would exceed the balance range
    #[error("Ticket revenue overflow")]
    RevenueOverflow,

    /// Persisted state could not be read or written
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Result type for event operations
pub type Result<T> = std::result::Result<T, EventError>;
