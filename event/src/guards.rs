//! Preconditions checked before any mutation.

use crate::error::{EventError, Phase, Result, Role};
use crate::model::Event;
use gala_chain::{AccountId, Balance, Storage, Timestamp};

impl Event {
    /// Caller must be the host
    ///
    /// # Errors
    ///
    /// [`EventError::Unauthorized`]
    pub fn assert_host(&self, caller: &AccountId) -> Result<()> {
        if *caller == self.host {
            Ok(())
        } else {
            Err(EventError::Unauthorized(Role::Host))
        }
    }

    /// Caller must be the host or a cohost
    ///
    /// # Errors
    ///
    /// [`EventError::Unauthorized`]
    pub fn assert_cohost<S: Storage + ?Sized>(&self, storage: &S, caller: &AccountId) -> Result<()> {
        if self.is_cohost(storage, caller)? {
            Ok(())
        } else {
            Err(EventError::Unauthorized(Role::Cohost))
        }
    }

    /// Caller must not be host, cohost, or guest
    ///
    /// # Errors
    ///
    /// [`EventError::Unauthorized`]
    pub fn assert_not_guest<S: Storage + ?Sized>(&self, storage: &S, caller: &AccountId) -> Result<()> {
        if self.is_insider(storage, caller)? {
            Err(EventError::Unauthorized(Role::Outsider))
        } else {
            Ok(())
        }
    }

    /// Event must not have gone public
    ///
    /// # Errors
    ///
    /// [`EventError::InvalidState`]
    pub const fn assert_private(&self) -> Result<()> {
        if self.public {
            Err(EventError::InvalidState(Phase::Private))
        } else {
            Ok(())
        }
    }

    /// Event must have gone public
    ///
    /// # Errors
    ///
    /// [`EventError::InvalidState`]
    pub const fn assert_public(&self) -> Result<()> {
        if self.public {
            Ok(())
        } else {
            Err(EventError::InvalidState(Phase::Public))
        }
    }

    /// Block time must be before the event date
    ///
    /// # Errors
    ///
    /// [`EventError::EventEnded`]
    pub fn assert_upcoming(&self, now: Timestamp) -> Result<()> {
        if now < self.details.date {
            Ok(())
        } else {
            Err(EventError::EventEnded)
        }
    }

    /// Deposit must cover the ticket price
    ///
    /// # Errors
    ///
    /// [`EventError::InsufficientPayment`]
    pub fn assert_paid(&self, deposit: Balance) -> Result<()> {
        if deposit >= self.ticket_price {
            Ok(())
        } else {
            Err(EventError::InsufficientPayment {
                attached: deposit,
                price: self.ticket_price,
            })
        }
    }

    /// While private, only the host and cohosts may read event details
    ///
    /// # Errors
    ///
    /// [`EventError::Unauthorized`]
    pub fn assert_public_or_cohost<S: Storage + ?Sized>(
        &self,
        storage: &S,
        caller: &AccountId,
    ) -> Result<()> {
        if self.public {
            Ok(())
        } else {
            self.assert_cohost(storage, caller)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use crate::details::EventDetails;
    use crate::error::{EventError, Phase, Role};
    use crate::model::{COHOSTS, Event, GUESTS};
    use gala_chain::{AccountId, Balance, Timestamp, Trie};

    fn account(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn setup() -> (Event, Trie) {
        let event = Event::new(
            account("alice"),
            EventDetails::new(Timestamp::from_nanos(100), "space", "space party", "dance"),
        );
        let mut trie = Trie::new();
        COHOSTS.insert(&mut trie, &account("bob")).unwrap();
        GUESTS.insert(&mut trie, &account("carol")).unwrap();
        (event, trie)
    }

    #[test]
    fn host_guard() {
        let (event, _) = setup();
        assert!(event.assert_host(&account("alice")).is_ok());
        assert_eq!(
            event.assert_host(&account("bob")),
            Err(EventError::Unauthorized(Role::Host))
        );
    }

    #[test]
    fn cohost_guard_admits_host() {
        let (event, trie) = setup();
        assert!(event.assert_cohost(&trie, &account("alice")).is_ok());
        assert!(event.assert_cohost(&trie, &account("bob")).is_ok());
        assert_eq!(
            event.assert_cohost(&trie, &account("carol")),
            Err(EventError::Unauthorized(Role::Cohost))
        );
    }

    #[test]
    fn not_guest_guard_rejects_every_insider() {
        let (event, trie) = setup();
        for insider in ["alice", "bob", "carol"] {
            assert_eq!(
                event.assert_not_guest(&trie, &account(insider)),
                Err(EventError::Unauthorized(Role::Outsider))
            );
        }
        assert!(event.assert_not_guest(&trie, &account("david")).is_ok());
    }

    #[test]
    fn phase_guards() {
        let (mut event, _) = setup();
        assert!(event.assert_private().is_ok());
        assert_eq!(event.assert_public(), Err(EventError::InvalidState(Phase::Public)));

        event.public = true;
        assert!(event.assert_public().is_ok());
        assert_eq!(event.assert_private(), Err(EventError::InvalidState(Phase::Private)));
    }

    #[test]
    fn upcoming_is_strictly_before_date() {
        let (event, _) = setup();
        assert!(event.assert_upcoming(Timestamp::from_nanos(99)).is_ok());
        assert_eq!(event.assert_upcoming(Timestamp::from_nanos(100)), Err(EventError::EventEnded));
    }

    #[test]
    fn paid_accepts_overpayment() {
        let (mut event, _) = setup();
        event.ticket_price = Balance::from_yocto(10);

        assert!(event.assert_paid(Balance::from_yocto(10)).is_ok());
        assert!(event.assert_paid(Balance::from_yocto(11)).is_ok());
        assert!(matches!(
            event.assert_paid(Balance::from_yocto(9)),
            Err(EventError::InsufficientPayment { .. })
        ));
    }

    #[test]
    fn visibility_guard() {
        let (mut event, trie) = setup();
        assert!(event.assert_public_or_cohost(&trie, &account("bob")).is_ok());
        assert!(event.assert_public_or_cohost(&trie, &account("carol")).is_err());

        event.public = true;
        assert!(event.assert_public_or_cohost(&trie, &account("carol")).is_ok());
    }
}
