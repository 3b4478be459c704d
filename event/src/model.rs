//! Persisted event state.
//!
//! The scalar fields live in a singleton record under [`EVENT_KEY`]. The
//! three membership collections live in their own namespaces and are read
//! and written through the storage handle on every call.

use crate::details::EventDetails;
use crate::error::{EventError, Result};
use gala_chain::storage::{read_record, write_record};
use gala_chain::{AccountId, Balance, PersistentSet, Storage};
use serde::{Deserialize, Serialize};

/// Storage key of the event singleton
pub const EVENT_KEY: &str = "ev";

/// Cohost accounts
pub const COHOSTS: PersistentSet<AccountId> = PersistentSet::new("ch");

/// Guest-list accounts
pub const GUESTS: PersistentSet<AccountId> = PersistentSet::new("gl");

/// Sold tickets
pub const TICKETS: PersistentSet<Ticket> = PersistentSet::new("tx");

/// A ticket to the event; one per owner
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Ticket {
    /// Account holding the ticket
    pub owner: AccountId,
}

/// The event singleton
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Account that initialized the event
    pub host: AccountId,
    /// Ticket cap; zero means unlimited
    pub max_tickets: u32,
    /// Price per ticket; zero means free
    pub ticket_price: Balance,
    /// Sum of deposits attached to successful purchases
    pub ticket_revenue: Balance,
    /// Set once by `pay_hosts`
    pub paid_out: bool,
    /// Set once by `go_public`
    pub public: bool,
    /// Date, location, and copy
    pub details: EventDetails,
}

impl Event {
    /// A private, free, unlimited event
    #[must_use]
    pub const fn new(host: AccountId, details: EventDetails) -> Self {
        Self {
            host,
            max_tickets: 0,
            ticket_price: Balance::ZERO,
            ticket_revenue: Balance::ZERO,
            paid_out: false,
            public: false,
            details,
        }
    }

    /// True once `initialize` has committed
    pub fn exists<S: Storage + ?Sized>(storage: &S) -> bool {
        storage.has_key(EVENT_KEY.as_bytes())
    }

    /// Load the singleton
    ///
    /// # Errors
    ///
    /// Returns [`EventError::NotInitialized`] before `initialize`.
    pub fn load<S: Storage + ?Sized>(storage: &S) -> Result<Self> {
        read_record(storage, EVENT_KEY)?.ok_or(EventError::NotInitialized)
    }

    /// Persist the singleton
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Storage`] if the record cannot be encoded.
    pub fn save<S: Storage + ?Sized>(&self, storage: &mut S) -> Result<()> {
        write_record(storage, EVENT_KEY, self)?;
        Ok(())
    }

    /// Cohosts in enumeration order
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Storage`] on corrupt entries.
    pub fn cohosts<S: Storage + ?Sized>(storage: &S) -> Result<Vec<AccountId>> {
        Ok(COHOSTS.values(storage)?)
    }

    /// Number of tickets sold
    pub fn tickets_sold<S: Storage + ?Sized>(storage: &S) -> u32 {
        u32::try_from(TICKETS.len(storage)).unwrap_or(u32::MAX)
    }

    /// True for the host and cohosts
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Storage`] if the lookup fails.
    pub fn is_cohost<S: Storage + ?Sized>(&self, storage: &S, account: &AccountId) -> Result<bool> {
        Ok(*account == self.host || COHOSTS.contains(storage, account)?)
    }

    /// True for the host, cohosts, and guests
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Storage`] if the lookup fails.
    pub fn is_insider<S: Storage + ?Sized>(&self, storage: &S, account: &AccountId) -> Result<bool> {
        Ok(self.is_cohost(storage, account)? || GUESTS.contains(storage, account)?)
    }

    /// True for insiders and ticket holders
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Storage`] if the lookup fails.
    pub fn has_ticket<S: Storage + ?Sized>(&self, storage: &S, account: &AccountId) -> Result<bool> {
        if self.is_insider(storage, account)? {
            return Ok(true);
        }
        let ticket = Ticket {
            owner: account.clone(),
        };
        Ok(TICKETS.contains(storage, &ticket)?)
    }
}

/// Read-only projection returned by `get_event`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventView {
    /// Account that initialized the event
    pub host: AccountId,
    /// Cohost accounts
    pub cohosts: Vec<AccountId>,
    /// Ticket cap; zero means unlimited
    pub max_tickets: u32,
    /// Price per ticket
    pub ticket_price: Balance,
    /// Whether tickets are on sale
    pub public: bool,
    /// Tickets sold so far
    pub tickets_sold: u32,
    /// Date, location, and copy
    pub details: EventDetails,
}
