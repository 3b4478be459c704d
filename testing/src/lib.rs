//! # Gala Testing
//!
//! Testing utilities for the Gala contracts.
//!
//! This crate provides:
//! - Deterministic clocks and a recording [`Host`](gala_chain::Host)
//! - A Given-When-Then builder for reducers ([`ReducerTest`])
//! - proptest strategies for chain types
//! - An in-memory [`Sandbox`] chain for end-to-end tests
//!
//! ## Example
//!
//! ```ignore
//! use gala_testing::Sandbox;
//!
//! #[tokio::test]
//! async fn deploys_an_event() {
//!     let sandbox = Sandbox::new();
//!     let alice = sandbox.create_account("alice", Balance::from_near(100))?;
//!     let event = sandbox.create_account("party", Balance::ZERO)?;
//!     sandbox.deploy(&event, Arc::new(EventCode))?;
//!
//!     sandbox
//!         .transact(&alice, &event, "initialize", &json!({ "details": details }), MIN_ACCOUNT_BALANCE)
//!         .await?;
//! }
//! ```

use chrono::{DateTime, Utc};
use gala_core::environment::Clock;

/// Mock implementations of environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use gala_chain::{AccountId, BoxFuture, Host, PromiseBatch, PromiseResult, Timestamp};
    use std::sync::atomic::{AtomicI64, Ordering};
    use std::sync::{Mutex, PoisonError};
    use std::time::Duration;

    /// Fixed clock for deterministic tests
    ///
    /// # Example
    ///
    /// ```
    /// use gala_testing::mocks::FixedClock;
    /// use gala_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// The instant every test clock starts at (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// Panics if the hardcoded timestamp fails to parse.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_epoch() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
            .expect("hardcoded timestamp should always parse")
            .with_timezone(&Utc)
    }

    /// Create a default fixed clock for tests
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(test_epoch())
    }

    const NANOS_PER_SECOND: i64 = 1_000_000_000;

    /// Clock that only moves when told to
    ///
    /// Shared between the sandbox and every contract deployed on it, so
    /// advancing it moves block time for all of them.
    #[derive(Debug)]
    pub struct ManualClock {
        nanos: AtomicI64,
    }

    impl ManualClock {
        /// Start at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                nanos: AtomicI64::new(time.timestamp_nanos_opt().unwrap_or_default()),
            }
        }

        /// Move forward by `duration`
        pub fn advance(&self, duration: Duration) {
            let delta = i64::try_from(duration.as_nanos()).unwrap_or(i64::MAX);
            // The closure always returns Some, so this cannot fail
            let _ = self
                .nanos
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                    Some(n.saturating_add(delta))
                });
        }

        /// Jump to `time`
        pub fn set(&self, time: DateTime<Utc>) {
            self.nanos
                .store(time.timestamp_nanos_opt().unwrap_or_default(), Ordering::SeqCst);
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(test_epoch())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            let nanos = self.nanos.load(Ordering::SeqCst);
            #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // rem_euclid is in 0..10^9
            let subsec = nanos.rem_euclid(NANOS_PER_SECOND) as u32;
            DateTime::from_timestamp(nanos.div_euclid(NANOS_PER_SECOND), subsec).unwrap_or_default()
        }
    }

    /// Host that records every batch and answers with a scripted result
    ///
    /// Block time starts at [`test_epoch`] and moves only through
    /// [`RecordingHost::advance`].
    #[derive(Debug)]
    pub struct RecordingHost {
        batches: Mutex<Vec<(AccountId, PromiseBatch)>>,
        signers: Mutex<Vec<AccountId>>,
        result: Mutex<PromiseResult>,
        clock: ManualClock,
    }

    impl RecordingHost {
        /// Host whose batches all succeed
        #[must_use]
        pub fn new() -> Self {
            Self::with_result(PromiseResult::Successful(b"null".to_vec()))
        }

        /// Host whose batches all fail
        #[must_use]
        pub fn failing() -> Self {
            Self::with_result(PromiseResult::Failed)
        }

        /// Host that answers every batch with `result`
        #[must_use]
        pub fn with_result(result: PromiseResult) -> Self {
            Self {
                batches: Mutex::new(Vec::new()),
                signers: Mutex::new(Vec::new()),
                result: Mutex::new(result),
                clock: ManualClock::default(),
            }
        }

        /// Move block time forward
        pub fn advance(&self, duration: Duration) {
            self.clock.advance(duration);
        }

        /// Change the scripted result
        pub fn set_result(&self, result: PromiseResult) {
            *self.result.lock().unwrap_or_else(PoisonError::into_inner) = result;
        }

        /// Every `(predecessor, batch)` executed so far
        #[must_use]
        pub fn batches(&self) -> Vec<(AccountId, PromiseBatch)> {
            self.batches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }

        /// Signer of every batch executed so far
        #[must_use]
        pub fn signers(&self) -> Vec<AccountId> {
            self.signers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl Default for RecordingHost {
        fn default() -> Self {
            Self::new()
        }
    }

    impl Host for RecordingHost {
        fn execute(
            &self,
            predecessor: AccountId,
            signer: AccountId,
            batch: PromiseBatch,
        ) -> BoxFuture<'_, PromiseResult> {
            self.signers
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(signer);
            self.batches
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((predecessor, batch));
            let result = self
                .result
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone();
            Box::pin(async move { result })
        }

        fn block_timestamp(&self) -> Timestamp {
            Timestamp::from_datetime(self.clock.now())
        }
    }
}

/// proptest strategies for chain types
pub mod properties {
    use gala_chain::{AccountId, Balance};
    use proptest::prelude::*;

    /// Valid single-segment account names under `.testnet`
    pub fn account_id() -> impl Strategy<Value = AccountId> {
        "[a-z][a-z0-9]{1,12}".prop_filter_map("valid account id", |name| {
            AccountId::new(format!("{name}.testnet")).ok()
        })
    }

    /// Balances up to `max_near` whole NEAR, in yocto
    pub fn balance(max_near: u128) -> impl Strategy<Value = Balance> {
        (0..=Balance::from_near(max_near).as_yocto()).prop_map(Balance::from_yocto)
    }
}

pub mod reducer_test;
pub mod sandbox;

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, RecordingHost, test_clock, test_epoch};
pub use reducer_test::{ReducerTest, assertions};
pub use sandbox::{ExecutionResult, Sandbox, SandboxError};

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_fixed_clock() {
        let clock = test_clock();
        assert_eq!(clock.now(), clock.now());
    }

    #[test]
    fn manual_clock_advances() {
        let clock = ManualClock::default();
        let start = clock.now();

        clock.advance(Duration::from_secs(90));

        assert_eq!(clock.now() - start, chrono::Duration::seconds(90));
    }

    #[test]
    fn manual_clock_keeps_nanoseconds() {
        let clock = ManualClock::default();
        clock.advance(Duration::from_nanos(1_500_000_001));

        assert_eq!(
            clock.now().timestamp_nanos_opt(),
            test_epoch().timestamp_nanos_opt().map(|n| n + 1_500_000_001)
        );
    }
}
