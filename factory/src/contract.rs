//! Deployable factory contract.

use crate::error::FactoryError;
use crate::operations;
use crate::reducer::{FactoryAction, FactoryCall, FactoryEnvironment, FactoryReducer, FactoryState};
use gala_chain::{
    BoxFuture, CallContext, CallOutcome, Contract, ContractCode, ContractError, Deployment,
};
use gala_event::EventCode;
use gala_runtime::Store;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Read-only methods with their JSON arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
pub enum FactoryQuery {
    /// Registered event names
    GetEventNames {},
    /// Workflow record for one name
    GetDeployment {
        /// Event name
        name: String,
    },
}

impl FactoryQuery {
    /// Every view method name
    pub const METHODS: [&'static str; 2] = ["get_event_names", "get_deployment"];
}

fn rejected(error: &FactoryError) -> ContractError {
    ContractError::Execution(error.to_string())
}

fn parse<T: DeserializeOwned>(method: &str, args: &[u8]) -> Result<T, ContractError> {
    let args: serde_json::Value = if args.is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_slice(args).map_err(|e| ContractError::invalid_arguments(method, e))?
    };

    serde_json::from_value(serde_json::json!({ "method": method, "args": args }))
        .map_err(|e| ContractError::invalid_arguments(method, e))
}

type FactoryStore = Store<FactoryState, FactoryAction, FactoryEnvironment, FactoryReducer>;

/// A deployed factory
pub struct FactoryContract {
    store: FactoryStore,
}

impl FactoryContract {
    /// Empty factory deploying `event_code`
    #[must_use]
    pub fn new(deployment: Deployment, event_code: Arc<dyn ContractCode>) -> Self {
        let environment = FactoryEnvironment::new(deployment.host, deployment.config, event_code);
        Self {
            store: Store::new(FactoryState::new(), FactoryReducer::new(), environment),
        }
    }

    async fn invoke(&self, context: CallContext, call: FactoryCall) -> Result<CallOutcome, ContractError> {
        let (mut handle, error) = self
            .store
            .send_and_inspect(FactoryAction::Invoke { context, call }, |state| {
                state.last_error.clone()
            })
            .await
            .map_err(|e| ContractError::Unavailable(e.to_string()))?;

        if let Some(error) = error {
            return Err(rejected(&error));
        }

        // Settles once the deployment batch resolved and the callback was reduced
        Ok(CallOutcome::unit().with_settlement(Box::pin(async move { handle.wait().await })))
    }

    async fn query(&self, query: FactoryQuery) -> Result<Vec<u8>, ContractError> {
        let answer = self
            .store
            .state(|state| match &query {
                FactoryQuery::GetEventNames {} => operations::get_event_names(&state.storage)
                    .map(|names| serde_json::to_vec(&names)),
                FactoryQuery::GetDeployment { name } => operations::get_deployment(&state.storage, name)
                    .map(|deployment| serde_json::to_vec(&deployment)),
            })
            .await;

        answer
            .map_err(|e| rejected(&e))?
            .map_err(|e| ContractError::Execution(e.to_string()))
    }
}

impl Contract for FactoryContract {
    fn call<'a>(
        &'a self,
        context: CallContext,
        method: &'a str,
        args: &'a [u8],
    ) -> BoxFuture<'a, Result<CallOutcome, ContractError>> {
        Box::pin(async move {
            if FactoryQuery::METHODS.contains(&method) {
                let return_value = self.query(parse(method, args)?).await?;
                return Ok(CallOutcome {
                    return_value,
                    settled: None,
                });
            }

            if !FactoryCall::METHODS.contains(&method) {
                return Err(ContractError::MethodNotFound(method.to_string()));
            }

            self.invoke(context, parse(method, args)?).await
        })
    }

    fn view<'a>(
        &'a self,
        _context: CallContext,
        method: &'a str,
        args: &'a [u8],
    ) -> BoxFuture<'a, Result<Vec<u8>, ContractError>> {
        Box::pin(async move {
            if !FactoryQuery::METHODS.contains(&method) {
                return Err(ContractError::MethodNotFound(method.to_string()));
            }
            self.query(parse(method, args)?).await
        })
    }

    fn shutdown(&self, timeout: Duration) -> BoxFuture<'_, Result<(), ContractError>> {
        Box::pin(async move {
            tracing::info!("Shutting down factory contract");
            self.store
                .shutdown(timeout)
                .await
                .map_err(|e| ContractError::Unavailable(e.to_string()))
        })
    }
}

/// Code for [`FactoryContract`]
#[derive(Clone, Debug)]
pub struct FactoryCode {
    event_code: Arc<dyn ContractCode>,
}

impl FactoryCode {
    /// Factory that deploys `event_code` for every new event
    #[must_use]
    pub fn new(event_code: Arc<dyn ContractCode>) -> Self {
        Self { event_code }
    }
}

impl Default for FactoryCode {
    fn default() -> Self {
        Self::new(Arc::new(EventCode))
    }
}

impl ContractCode for FactoryCode {
    fn name(&self) -> &str {
        "factory"
    }

    fn instantiate(&self, deployment: Deployment) -> Arc<dyn Contract> {
        tracing::debug!(
            account = %deployment.account_id,
            event_code = self.event_code.name(),
            "Instantiating factory contract"
        );
        Arc::new(FactoryContract::new(deployment, Arc::clone(&self.event_code)))
    }
}
