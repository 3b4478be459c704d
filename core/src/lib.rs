//! # Gala Core
//!
//! Core traits and types shared by the Gala contracts.
//!
//! Every contract in this workspace is written as a reducer:
//!
//! - **State**: the contract's persisted storage plus the outcome of the last call
//! - **Action**: one host-delivered invocation (a change method or a callback)
//! - **Reducer**: `(State, Action, Environment) → (State, Effects)`
//! - **Effect**: a description of asynchronous host work (transfers, deployments)
//! - **Environment**: injected platform dependencies (clock, host, limits)
//!
//! Guards and mutations are pure; anything that leaves the contract (moving
//! money, creating accounts, calling another contract) is returned as an
//! [`effect::Effect`] and executed by the runtime, which feeds any resulting
//! callback action back into the same reducer.
//!
//! ## Example
//!
//! ```ignore
//! use gala_core::*;
//!
//! impl Reducer for EventReducer {
//!     type State = EventState;
//!     type Action = EventAction;
//!     type Environment = EventEnvironment;
//!
//!     fn reduce(
//!         &self,
//!         state: &mut EventState,
//!         action: EventAction,
//!         env: &EventEnvironment,
//!     ) -> SmallVec<[Effect<EventAction>; 4]> {
//!         // guard, mutate a draft, commit, describe transfers
//!         smallvec![Effect::None]
//!     }
//! }
//! ```

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};
pub use smallvec::{SmallVec, smallvec};

/// Reducer module - the trait every contract implements
pub mod reducer {
    use super::SmallVec;
    use super::effect::Effect;

    /// The Reducer trait - core abstraction for contract logic
    ///
    /// # Type Parameters
    ///
    /// - `State`: The contract state this reducer operates on
    /// - `Action`: The invocations this reducer processes
    /// - `Environment`: The injected platform dependencies
    ///
    /// # Example
    ///
    /// ```ignore
    /// impl Reducer for FactoryReducer {
    ///     type State = FactoryState;
    ///     type Action = FactoryAction;
    ///     type Environment = FactoryEnvironment;
    ///
    ///     fn reduce(
    ///         &self,
    ///         state: &mut FactoryState,
    ///         action: FactoryAction,
    ///         env: &FactoryEnvironment,
    ///     ) -> SmallVec<[Effect<FactoryAction>; 4]> {
    ///         match action {
    ///             FactoryAction::Invoke { context, call } => { /* ... */ }
    ///         }
    ///     }
    /// }
    /// ```
    pub trait Reducer {
        /// The state type this reducer operates on
        type State;

        /// The action type this reducer processes
        type Action;

        /// The environment type with injected dependencies
        type Environment;

        /// Reduce an action into state changes and effects
        ///
        /// This is a pure function that:
        /// 1. Validates the action (guards)
        /// 2. Updates state in place
        /// 3. Returns effect descriptions to be executed
        ///
        /// Reducers must not block and must not perform I/O directly.
        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]>;
    }
}

/// Effect module - side effect descriptions
///
/// Effects are values, not execution. They are returned from reducers and run
/// by the Store runtime.
pub mod effect {
    use std::future::Future;
    use std::pin::Pin;

    /// Effect type - describes a side effect to be executed
    ///
    /// # Type Parameters
    ///
    /// - `Action`: The action type that effects can produce (feedback loop)
    pub enum Effect<Action> {
        /// No-op effect
        None,

        /// Run effects one after another, each one settled before the next starts
        ///
        /// A payout issues its transfers this way so the host is paid first.
        Sequential(Vec<Effect<Action>>),

        /// Arbitrary async computation
        ///
        /// Returns `Option<Action>` - if Some, the action is fed back into the reducer.
        /// This is how a chained host callback re-enters the contract.
        Future(Pin<Box<dyn Future<Output = Option<Action>> + Send>>),
    }

    // Manual Debug implementation since Future doesn't implement Debug
    impl<Action> std::fmt::Debug for Effect<Action>
    where
        Action: std::fmt::Debug,
    {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                Effect::None => write!(f, "Effect::None"),
                Effect::Sequential(effects) => {
                    f.debug_tuple("Effect::Sequential").field(effects).finish()
                },
                Effect::Future(_) => write!(f, "Effect::Future(<future>)"),
            }
        }
    }

    impl<Action> Effect<Action> {
        /// Chain effects to run sequentially
        #[must_use]
        pub const fn chain(effects: Vec<Effect<Action>>) -> Effect<Action> {
            Effect::Sequential(effects)
        }

        /// Count the leaf `Future` effects, descending into chains
        #[must_use]
        pub fn future_count(&self) -> usize {
            match self {
                Effect::None => 0,
                Effect::Future(_) => 1,
                Effect::Sequential(effects) => effects.iter().map(Effect::future_count).sum(),
            }
        }
    }
}

/// Environment module - dependency injection traits
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time so block timestamps are testable
    ///
    /// # Examples
    ///
    /// ```ignore
    /// // Production - uses system clock
    /// let clock = SystemClock;
    ///
    /// // Test - fixed time for deterministic tests
    /// let clock = FixedClock::new(Utc::now());
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::effect::Effect;
    use super::environment::{Clock, SystemClock};

    fn settle(value: u8) -> Effect<u8> {
        Effect::Future(Box::pin(async move { Some(value) }))
    }

    #[test]
    fn future_count_descends_into_chains() {
        let effect = Effect::chain(vec![
            settle(1),
            Effect::chain(vec![settle(2), Effect::None]),
            Effect::None,
        ]);

        assert_eq!(effect.future_count(), 2);
        assert_eq!(Effect::<u8>::None.future_count(), 0);
    }

    #[tokio::test]
    async fn chained_futures_keep_their_order() {
        let Effect::Sequential(effects) = Effect::chain(vec![settle(1), settle(2)]) else {
            unreachable!("chain always builds a Sequential effect");
        };

        let mut actions = Vec::new();
        for effect in effects {
            if let Effect::Future(fut) = effect {
                actions.extend(fut.await);
            }
        }
        assert_eq!(actions, vec![1, 2]);
    }

    #[test]
    fn system_clock_tracks_wall_time() {
        let before = chrono::Utc::now();
        let now = SystemClock.now();
        assert!(now >= before);
    }
}
