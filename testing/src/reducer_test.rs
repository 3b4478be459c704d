//! Given-When-Then testing for contract reducers.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use gala_core::{effect::Effect, reducer::Reducer};

type StateAssertion<S> = Box<dyn FnOnce(&S)>;

type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent reducer test
///
/// Actions are applied in order to the given state; assertions run against
/// the final state and the effects returned by the last action.
///
/// # Example
///
/// ```ignore
/// use gala_testing::ReducerTest;
///
/// ReducerTest::new(EventReducer)
///     .with_env(test_environment())
///     .given_state(initialized_event())
///     .when_action(invoke(BOB, EventCall::GoPublic {}))
///     .then_state(|state| {
///         assert_eq!(state.last_error, Some(EventError::Unauthorized(..)));
///     })
///     .then_effects(assertions::assert_no_effects)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    actions: Vec<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the environment
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Apply an action before the one under test (Given)
    ///
    /// Effects from these actions are discarded.
    #[must_use]
    pub fn given_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// The action under test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the actions and every assertion
    ///
    /// # Panics
    ///
    /// Panics if state, environment, or an action is missing, or if any
    /// assertion fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");

        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        assert!(
            !self.actions.is_empty(),
            "Action must be set with when_action()"
        );

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action, &env).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }

        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use gala_core::effect::Effect;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if any effect other than `Effect::None` is present.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().all(|e| matches!(e, Effect::None)),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert the number of top-level effects
    ///
    /// # Panics
    ///
    /// Panics if the number of effects doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_effects_count<A>(effects: &[Effect<A>], expected: usize) {
        assert_eq!(
            effects.len(),
            expected,
            "Expected {} effects, but found {}",
            expected,
            effects.len()
        );
    }

    /// Assert that at least one `Future` effect is present, at any depth
    ///
    /// # Panics
    ///
    /// Panics if no Future effect is found.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| e.future_count() > 0),
            "Expected at least one Future effect, but none found"
        );
    }

    /// Assert the total number of `Future` effects, at any depth
    ///
    /// # Panics
    ///
    /// Panics if the count doesn't match expected.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_future_count<A>(effects: &[Effect<A>], expected: usize) {
        let found: usize = effects.iter().map(Effect::future_count).sum();
        assert_eq!(
            found, expected,
            "Expected {expected} Future effects, but found {found}"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gala_core::effect::Effect;
    use gala_core::reducer::Reducer;
    use smallvec::{SmallVec, smallvec};

    #[derive(Clone, Debug)]
    struct TallyState {
        sold: u32,
    }

    #[derive(Clone, Debug)]
    enum TallyAction {
        Sell,
        Payout,
    }

    struct TallyReducer;

    struct TallyEnv;

    impl Reducer for TallyReducer {
        type State = TallyState;
        type Action = TallyAction;
        type Environment = TallyEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TallyAction::Sell => {
                    state.sold += 1;
                    smallvec![Effect::None]
                },
                TallyAction::Payout => smallvec![Effect::chain(vec![
                    Effect::Future(Box::pin(async { None })),
                    Effect::Future(Box::pin(async { None })),
                ])],
            }
        }
    }

    #[test]
    fn single_action() {
        ReducerTest::new(TallyReducer)
            .with_env(TallyEnv)
            .given_state(TallyState { sold: 0 })
            .when_action(TallyAction::Sell)
            .then_state(|state| assert_eq!(state.sold, 1))
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn given_actions_are_applied_first() {
        ReducerTest::new(TallyReducer)
            .with_env(TallyEnv)
            .given_state(TallyState { sold: 0 })
            .given_action(TallyAction::Sell)
            .given_action(TallyAction::Sell)
            .when_action(TallyAction::Payout)
            .then_state(|state| assert_eq!(state.sold, 2))
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_has_future_effect(effects);
                assertions::assert_future_count(effects, 2);
            })
            .run();
    }

    #[test]
    fn no_effects_accepts_empty_and_none() {
        assertions::assert_no_effects::<TallyAction>(&[Effect::None]);
        assertions::assert_no_effects::<TallyAction>(&[]);
    }
}
