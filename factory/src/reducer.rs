//! Factory contract reducer.
//!
//! `create_event` issues one batch against the new sub-account. When the
//! host resolves it, the effect feeds `on_event_created` back into the store
//! as a self-call carrying the batch result.

use crate::error::{FactoryError, Result};
use crate::operations;
use crate::workflow::Deployment;
use gala_chain::{CallContext, ChainConfig, ContractCode, Host, PromiseBatch, Trie};
use gala_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use gala_event::EventDetails;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Contract storage plus the outcome of the most recent change call
#[derive(Clone, Debug, Default)]
pub struct FactoryState {
    /// Committed storage
    pub storage: Trie,
    /// Error of the last change call, `None` if it succeeded
    pub last_error: Option<FactoryError>,
}

impl FactoryState {
    /// Empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Change methods with their JSON arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
pub enum FactoryCall {
    /// Deploy and initialize a new event
    CreateEvent {
        /// Sub-account name
        name: String,
        /// Forwarded to the event's `initialize`
        details: EventDetails,
    },
    /// Deployment callback; self-calls only
    OnEventCreated {
        /// Sub-account name
        name: String,
    },
}

impl FactoryCall {
    /// Every change method name
    pub const METHODS: [&'static str; 2] = ["create_event", "on_event_created"];

    /// The method name
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::CreateEvent { .. } => "create_event",
            Self::OnEventCreated { .. } => "on_event_created",
        }
    }
}

/// Inputs to the factory reducer
#[derive(Clone, Debug)]
pub enum FactoryAction {
    /// A change method, from a client or from the factory's own callback
    Invoke {
        /// Call context
        context: CallContext,
        /// Method and arguments
        call: FactoryCall,
    },
}

/// `initialize` arguments forwarded to the new event
#[derive(Serialize)]
struct InitializeArgs<'a> {
    details: &'a EventDetails,
}

/// Platform dependencies of the factory
#[derive(Clone)]
pub struct FactoryEnvironment {
    /// Executes deployment batches
    pub host: Arc<dyn Host>,
    /// Platform limits
    pub config: ChainConfig,
    /// Code deployed to every new event account
    pub event_code: Arc<dyn ContractCode>,
}

impl FactoryEnvironment {
    /// Create a new environment
    #[must_use]
    pub fn new(host: Arc<dyn Host>, config: ChainConfig, event_code: Arc<dyn ContractCode>) -> Self {
        Self {
            host,
            config,
            event_code,
        }
    }
}

/// Reducer for the factory contract
#[derive(Clone, Debug, Default)]
pub struct FactoryReducer;

impl FactoryReducer {
    /// Create a new reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Create the account, deploy, hand the caller a key, and initialize
    fn deployment_batch(
        deployment: &Deployment,
        details: &EventDetails,
        ctx: &CallContext,
        env: &FactoryEnvironment,
    ) -> Result<PromiseBatch> {
        tracing::info!("creating event contract");
        let batch = PromiseBatch::new(deployment.account_id.clone())
            .create_account()
            .deploy_contract(Arc::clone(&env.event_code))
            .add_full_access_key(ctx.signer_account_pk.clone());

        tracing::info!("initializing event");
        batch
            .function_call(
                "initialize",
                &InitializeArgs { details },
                deployment.deposit,
                env.config.xcc_gas,
            )
            .map_err(|e| FactoryError::Encode(e.to_string()))
    }

    fn apply(
        storage: &mut Trie,
        ctx: &CallContext,
        call: FactoryCall,
        env: &FactoryEnvironment,
    ) -> Result<Effect<FactoryAction>> {
        match call {
            FactoryCall::CreateEvent { name, details } => {
                let requested =
                    operations::request_deployment(storage, ctx, &name, env.config.min_account_balance)?;
                let batch = Self::deployment_batch(&requested, &details, ctx, env)?;
                let deployment = operations::start_deployment(storage, requested)?;

                metrics::counter!("factory.deployments.requested").increment(1);
                tracing::info!(
                    name = %deployment.name,
                    account = %deployment.account_id,
                    deposit = %deployment.deposit,
                    "Deployment issued"
                );

                let host = Arc::clone(&env.host);
                let factory = ctx.current_account_id.clone();
                let signer = ctx.signer_account_id.clone();
                let gas = env.config.xcc_gas;

                Ok(Effect::Future(Box::pin(async move {
                    let result = host.execute(factory.clone(), signer.clone(), batch).await;
                    let resolved_at = host.block_timestamp();
                    let context = CallContext::new(factory.clone(), factory, resolved_at)
                        .with_signer(signer)
                        .with_prepaid_gas(gas)
                        .with_promise_results(vec![result]);
                    Some(FactoryAction::Invoke {
                        context,
                        call: FactoryCall::OnEventCreated { name },
                    })
                })))
            },
            FactoryCall::OnEventCreated { name } => {
                match operations::resolve_deployment(storage, ctx, &name)? {
                    Some(status) => {
                        metrics::counter!("factory.deployments.resolved", "status" => status.to_string())
                            .increment(1);
                    },
                    None => metrics::counter!("factory.deployments.pending").increment(1),
                }
                Ok(Effect::None)
            },
        }
    }
}

impl Reducer for FactoryReducer {
    type State = FactoryState;
    type Action = FactoryAction;
    type Environment = FactoryEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            FactoryAction::Invoke { context, call } => {
                let method = call.method_name();
                let mut draft = state.storage.clone();

                match Self::apply(&mut draft, &context, call, env) {
                    Ok(effect) => {
                        state.storage = draft;
                        state.last_error = None;
                        tracing::debug!(
                            caller = %context.predecessor_account_id,
                            method,
                            "Call committed"
                        );
                        smallvec![effect]
                    },
                    Err(error) => {
                        tracing::warn!(
                            caller = %context.predecessor_account_id,
                            method,
                            %error,
                            "Call rejected"
                        );
                        metrics::counter!("factory.calls.rejected", "method" => method).increment(1);
                        state.last_error = Some(error);
                        smallvec![Effect::None]
                    },
                }
            },
        }
    }
}
