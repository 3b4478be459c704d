//! # Gala Runtime
//!
//! The Store runtime that hosts one contract instance.
//!
//! ## Core Components
//!
//! - **Store**: owns the contract state and serializes every invocation behind a write lock
//! - **Effect Executor**: runs effect descriptions and feeds callback actions back in
//! - **`EffectHandle`**: lets callers wait until the effects of one invocation are done
//!
//! The write lock gives the run-to-completion guarantee a blockchain host
//! provides: one invocation at a time per instance, no interleaving inside a
//! call, while effects (transfers, deployments) complete independently and
//! re-enter only as new invocations.
//!
//! ## Example
//!
//! ```ignore
//! use gala_runtime::Store;
//!
//! let store = Store::new(EventState::default(), EventReducer::new(), environment);
//!
//! // Invoke a change method
//! store.send(EventAction::Invoke { context, call }).await?;
//!
//! // Read state
//! let initialized = store.state(|s| s.is_initialized()).await;
//! ```

use gala_core::{effect::Effect, reducer::Reducer};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::sync::{RwLock, watch};

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur during Store operations
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// Store is shutting down and not accepting new actions
        ///
        /// This error is returned when `send()` is called after shutdown initiated.
        #[error("Store is shutting down")]
        ShutdownInProgress,

        /// Shutdown timed out waiting for effects to complete
        #[error("Shutdown timed out with {0} effects still running")]
        ShutdownTimeout(usize),
    }
}

pub use error::StoreError;

/// Handle for tracking effect completion
///
/// Returned by [`Store::send()`] to allow waiting for the effects of one
/// action to complete. Only direct effects are tracked: a callback action fed
/// back by a `Future` effect finishes reducing before the effect counts as done,
/// but effects started by that callback are tracked by their own handle.
///
/// # Example
///
/// ```ignore
/// let mut handle = store.send(action).await?;
/// handle.wait().await;
/// // the deployment callback has been reduced
/// ```
#[derive(Clone)]
pub struct EffectHandle {
    effects: Arc<AtomicUsize>,
    completion: watch::Receiver<()>,
}

impl EffectHandle {
    /// Create a new effect handle and the tracking used to execute effects
    fn new() -> (Self, EffectTracking) {
        let counter = Arc::new(AtomicUsize::new(0));
        let (tx, rx) = watch::channel(());

        let handle = Self {
            effects: Arc::clone(&counter),
            completion: rx,
        };

        let tracking = EffectTracking {
            counter,
            notifier: tx,
        };

        (handle, tracking)
    }

    /// Number of effects still running
    #[must_use]
    pub fn pending(&self) -> usize {
        self.effects.load(Ordering::SeqCst)
    }

    /// Wait for all effects to complete
    pub async fn wait(&mut self) {
        while self.effects.load(Ordering::SeqCst) > 0 {
            if self.completion.changed().await.is_err() {
                // All trackers dropped: nothing can still be running
                break;
            }
        }
    }
}

impl std::fmt::Debug for EffectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EffectHandle")
            .field("pending_effects", &self.effects.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

/// Internal: counts running effects and signals when none are left
///
/// One per [`EffectHandle`], plus one per store covering every handle.
#[derive(Clone)]
struct EffectTracking {
    counter: Arc<AtomicUsize>,
    notifier: watch::Sender<()>,
}

impl EffectTracking {
    fn idle() -> Self {
        let (notifier, _) = watch::channel(());
        Self {
            counter: Arc::new(AtomicUsize::new(0)),
            notifier,
        }
    }

    fn pending(&self) -> usize {
        self.counter.load(Ordering::SeqCst)
    }

    /// Resolve once the counter reaches zero
    async fn drained(&self) {
        let mut idle = self.notifier.subscribe();
        while self.pending() > 0 {
            if idle.changed().await.is_err() {
                break;
            }
        }
    }

    /// Increment the effect counter (effect started)
    fn increment(&self) {
        self.counter.fetch_add(1, Ordering::SeqCst);
    }

    /// Decrement the effect counter (effect completed)
    fn decrement(&self) {
        if self.counter.fetch_sub(1, Ordering::SeqCst) == 1 {
            // Counter reached zero, notify waiters
            self.notifier.send_replace(());
        }
    }
}

/// Internal: RAII guard that decrements effect counter on drop
///
/// Ensures the effect counter is always decremented, even if the effect panics.
struct DecrementGuard(EffectTracking);

impl Drop for DecrementGuard {
    fn drop(&mut self) {
        self.0.decrement();
    }
}

/// Store module - the runtime for one contract instance
pub mod store {
    use super::{
        Arc, AtomicBool, DecrementGuard, Duration, Effect, EffectHandle, EffectTracking, Ordering,
        Reducer, RwLock, StoreError,
    };

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store manages:
    /// 1. State (behind `RwLock`; the write lock serializes invocations)
    /// 2. Reducer (contract logic)
    /// 3. Environment (injected platform dependencies)
    /// 4. Effect execution (with callback feedback)
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        shutdown: Arc<AtomicBool>,
        in_flight: EffectTracking,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync + 'static,
        A: Send + 'static,
        S: Send + Sync + 'static,
        E: Send + Sync + 'static,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                shutdown: Arc::new(AtomicBool::new(false)),
                in_flight: EffectTracking::idle(),
            }
        }

        /// Stop accepting actions and wait for running effects
        ///
        /// Actions sent afterwards, including callbacks fed back by effects
        /// that are still running, fail with [`StoreError::ShutdownInProgress`].
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownTimeout`] if effects are still running
        /// when `timeout` elapses.
        pub async fn shutdown(&self, timeout: Duration) -> Result<(), StoreError> {
            self.shutdown.store(true, Ordering::Release);
            tracing::info!(pending = self.in_flight.pending(), "Store shutting down");

            if tokio::time::timeout(timeout, self.in_flight.drained()).await.is_ok() {
                tracing::info!("Store drained");
                return Ok(());
            }

            let pending = self.in_flight.pending();
            tracing::error!(pending, "Store shutdown timed out");
            metrics::counter!("store.shutdown.timeout").increment(1);
            Err(StoreError::ShutdownTimeout(pending))
        }

        /// Send an action to the store
        ///
        /// 1. Acquires write lock on state
        /// 2. Calls reducer with (state, action, environment)
        /// 3. Starts the returned effects
        ///
        /// `send()` returns after starting effect execution, not completion.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<EffectHandle, StoreError>
        where
            R: Clone,
            E: Clone,
        {
            self.send_and_inspect(action, |_| ())
                .await
                .map(|(handle, ())| handle)
        }

        /// Send an action and read the resulting state under the same lock
        ///
        /// The inspection runs after the reducer and before any other action
        /// can be reduced, so it observes exactly the outcome of `action` even
        /// when callbacks are racing in from earlier effects.
        ///
        /// # Errors
        ///
        /// Returns [`StoreError::ShutdownInProgress`] if the store is shutting down.
        pub async fn send_and_inspect<F, T>(
            &self,
            action: A,
            inspect: F,
        ) -> Result<(EffectHandle, T), StoreError>
        where
            R: Clone,
            E: Clone,
            F: FnOnce(&S) -> T,
        {
            if self.shutdown.load(Ordering::Acquire) {
                tracing::warn!("Rejected action: store is shutting down");
                metrics::counter!("store.shutdown.rejected_actions").increment(1);
                return Err(StoreError::ShutdownInProgress);
            }

            metrics::counter!("store.commands.total").increment(1);

            let (handle, tracking) = EffectHandle::new();

            let (effects, observed) = {
                let mut state = self.state.write().await;
                tracing::trace!("Acquired write lock on state");

                let span = tracing::debug_span!("reducer_execution");
                let _enter = span.enter();

                let start = std::time::Instant::now();
                let effects = self.reducer.reduce(&mut *state, action, &self.environment);
                metrics::histogram!("store.reducer.duration_seconds")
                    .record(start.elapsed().as_secs_f64());

                tracing::trace!("Reducer completed, returned {} effects", effects.len());

                (effects, inspect(&*state))
            };

            for effect in effects {
                self.execute_effect_internal(effect, tracking.clone());
            }

            Ok((handle, observed))
        }

        /// Read current state via a closure
        ///
        /// ```ignore
        /// let sold = store.state(|s| s.tickets_sold()).await;
        /// ```
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Execute an effect with tracking
        ///
        /// - `None`: No-op
        /// - `Future`: Spawned; a returned action is sent back to the store
        /// - `Sequential`: Effects run in order, each awaited before the next
        ///
        /// Reducer panics propagate. Effect panics are contained in their task;
        /// [`DecrementGuard`] keeps the counters honest either way.
        #[allow(clippy::needless_pass_by_value)] // tracking is cloned per child effect
        fn execute_effect_internal(&self, effect: Effect<A>, tracking: EffectTracking)
        where
            R: Clone,
            E: Clone,
        {
            match effect {
                Effect::None => {
                    tracing::trace!("Executing Effect::None (no-op)");
                    metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                },
                Effect::Future(fut) => {
                    tracing::trace!("Executing Effect::Future");
                    metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                    let guards = self.track(tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guards = guards;

                        if let Some(action) = fut.await {
                            tracing::trace!("Effect::Future produced an action, sending to store");
                            if let Err(error) = store.send(action).await {
                                tracing::warn!(%error, "Dropped feedback action");
                            }
                        } else {
                            tracing::trace!("Effect::Future completed with no action");
                        }
                    });
                },
                Effect::Sequential(effects) => {
                    let effect_count = effects.len();
                    tracing::trace!("Executing Effect::Sequential with {} effects", effect_count);
                    metrics::counter!("store.effects.executed", "type" => "sequential").increment(1);

                    let guards = self.track(tracking);
                    let store = self.clone();

                    tokio::spawn(async move {
                        let _guards = guards;

                        for (idx, effect) in effects.into_iter().enumerate() {
                            tracing::trace!(
                                "Executing sequential effect {} of {}",
                                idx + 1,
                                effect_count
                            );

                            let step = EffectTracking::idle();
                            store.execute_effect_internal(effect, step.clone());
                            step.drained().await;
                        }
                        tracing::trace!("Effect::Sequential completed");
                    });
                },
            }
        }
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        /// Count one more running effect on `tracking` and on the store
        fn track(&self, tracking: EffectTracking) -> (DecrementGuard, DecrementGuard) {
            tracking.increment();
            self.in_flight.increment();
            (DecrementGuard(tracking), DecrementGuard(self.in_flight.clone()))
        }
    }

    impl<S, A, E, R> Clone for Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Clone,
        E: Clone,
    {
        fn clone(&self) -> Self {
            Self {
                state: Arc::clone(&self.state),
                reducer: self.reducer.clone(),
                environment: self.environment.clone(),
                shutdown: Arc::clone(&self.shutdown),
                in_flight: self.in_flight.clone(),
            }
        }
    }
}

// Re-export for convenience
pub use store::Store;
