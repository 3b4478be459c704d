//! Deployable event contract.
//!
//! Bridges the host's method-name-plus-JSON calling convention onto the
//! event [`Store`]. Change methods are reduced as [`EventAction::Invoke`];
//! view methods read the committed storage directly.

use crate::error::EventError;
use crate::operations;
use crate::reducer::{EventAction, EventCall, EventEnvironment, EventReducer, EventState};
use gala_chain::{
    AccountId, BoxFuture, CallContext, CallOutcome, Contract, ContractCode, ContractError,
    Deployment, Storage,
};
use gala_runtime::Store;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Read-only methods with their JSON arguments
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
pub enum EventQuery {
    /// Full event view
    GetEvent {},
    /// Host account
    GetHost {},
    /// Cohost accounts
    GetCohosts {},
    /// Event details
    GetDetails {},
    /// Ticket price
    GetTicketPrice {},
    /// Ticket cap
    GetMaxTickets {},
    /// Tickets sold; hosts only
    GetTicketsSold {},
    /// Whether `attendee` may attend
    HasTicket {
        /// Account to check
        attendee: AccountId,
    },
}

impl EventQuery {
    /// Every view method name
    pub const METHODS: [&'static str; 8] = [
        "get_event",
        "get_host",
        "get_cohosts",
        "get_details",
        "get_ticket_price",
        "get_max_tickets",
        "get_tickets_sold",
        "has_ticket",
    ];

    /// Run the query and encode the answer
    fn answer<S: Storage + ?Sized>(
        &self,
        storage: &S,
        ctx: &CallContext,
    ) -> Result<Vec<u8>, ContractError> {
        match self {
            Self::GetEvent {} => encode(operations::get_event(storage, ctx)),
            Self::GetHost {} => encode(operations::get_host(storage, ctx)),
            Self::GetCohosts {} => encode(operations::get_cohosts(storage, ctx)),
            Self::GetDetails {} => encode(operations::get_details(storage, ctx)),
            Self::GetTicketPrice {} => encode(operations::get_ticket_price(storage, ctx)),
            Self::GetMaxTickets {} => encode(operations::get_max_tickets(storage, ctx)),
            Self::GetTicketsSold {} => encode(operations::get_tickets_sold(storage, ctx)),
            Self::HasTicket { attendee } => encode(operations::has_ticket(storage, attendee)),
        }
    }
}

fn encode<T: Serialize>(result: Result<T, EventError>) -> Result<Vec<u8>, ContractError> {
    let value = result.map_err(rejected)?;
    serde_json::to_vec(&value).map_err(|e| ContractError::Execution(e.to_string()))
}

fn rejected(error: EventError) -> ContractError {
    ContractError::Execution(error.to_string())
}

/// Decode `args` as the arguments of `method`
///
/// Empty input is treated as `{}` so argument-less methods can be called
/// without a body.
fn parse<T: DeserializeOwned>(method: &str, args: &[u8]) -> Result<T, ContractError> {
    let args: serde_json::Value = if args.is_empty() {
        serde_json::Value::Object(serde_json::Map::new())
    } else {
        serde_json::from_slice(args).map_err(|e| ContractError::invalid_arguments(method, e))?
    };

    serde_json::from_value(serde_json::json!({ "method": method, "args": args }))
        .map_err(|e| ContractError::invalid_arguments(method, e))
}

// ============================================================================
// Contract
// ============================================================================

type EventStore = Store<EventState, EventAction, EventEnvironment, EventReducer>;

/// A deployed event
pub struct EventContract {
    account_id: AccountId,
    store: EventStore,
}

impl EventContract {
    /// Uninitialized event at `deployment.account_id`
    #[must_use]
    pub fn new(deployment: Deployment) -> Self {
        let environment = EventEnvironment::new(deployment.host, deployment.config);
        Self {
            account_id: deployment.account_id,
            store: Store::new(EventState::new(), EventReducer::new(), environment),
        }
    }

    /// Account the event is deployed to
    #[must_use]
    pub const fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    async fn invoke(&self, context: CallContext, call: EventCall) -> Result<CallOutcome, ContractError> {
        let (mut handle, error) = self
            .store
            .send_and_inspect(EventAction::Invoke { context, call }, |state| {
                state.last_error.clone()
            })
            .await
            .map_err(|e| ContractError::Unavailable(e.to_string()))?;

        if let Some(error) = error {
            return Err(rejected(error));
        }

        Ok(CallOutcome::unit().with_settlement(Box::pin(async move { handle.wait().await })))
    }

    async fn query(&self, context: CallContext, query: EventQuery) -> Result<Vec<u8>, ContractError> {
        self.store
            .state(|state| query.answer(&state.storage, &context))
            .await
    }
}

impl std::fmt::Debug for EventContract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventContract")
            .field("account_id", &self.account_id)
            .finish_non_exhaustive()
    }
}

impl Contract for EventContract {
    fn call<'a>(
        &'a self,
        context: CallContext,
        method: &'a str,
        args: &'a [u8],
    ) -> BoxFuture<'a, Result<CallOutcome, ContractError>> {
        Box::pin(async move {
            if EventQuery::METHODS.contains(&method) {
                let query = parse(method, args)?;
                let return_value = self.query(context, query).await?;
                return Ok(CallOutcome {
                    return_value,
                    settled: None,
                });
            }

            if !EventCall::METHODS.contains(&method) {
                return Err(ContractError::MethodNotFound(method.to_string()));
            }

            let call = parse(method, args)?;
            self.invoke(context, call).await
        })
    }

    fn view<'a>(
        &'a self,
        context: CallContext,
        method: &'a str,
        args: &'a [u8],
    ) -> BoxFuture<'a, Result<Vec<u8>, ContractError>> {
        Box::pin(async move {
            if !EventQuery::METHODS.contains(&method) {
                return Err(ContractError::MethodNotFound(method.to_string()));
            }

            let query = parse(method, args)?;
            self.query(context, query).await
        })
    }

    fn shutdown(&self, timeout: Duration) -> BoxFuture<'_, Result<(), ContractError>> {
        Box::pin(async move {
            tracing::info!(event = %self.account_id, "Shutting down event contract");
            self.store
                .shutdown(timeout)
                .await
                .map_err(|e| ContractError::Unavailable(e.to_string()))
        })
    }
}

/// Code for [`EventContract`], deployable by the factory
#[derive(Clone, Copy, Debug, Default)]
pub struct EventCode;

impl ContractCode for EventCode {
    fn name(&self) -> &str {
        "event"
    }

    fn instantiate(&self, deployment: Deployment) -> Arc<dyn Contract> {
        tracing::debug!(account = %deployment.account_id, "Instantiating event contract");
        Arc::new(EventContract::new(deployment))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::details::EventDetails;
    use gala_chain::constants::MIN_ACCOUNT_BALANCE;
    use gala_chain::{ChainConfig, Timestamp};
    use gala_testing::RecordingHost;
    use serde_json::json;

    fn account(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::from_datetime(gala_testing::test_epoch())
    }

    fn contract() -> Arc<dyn Contract> {
        EventCode.instantiate(Deployment {
            account_id: account("party.factory"),
            host: Arc::new(RecordingHost::new()),
            config: ChainConfig::default(),
        })
    }

    fn ctx(caller: &str) -> CallContext {
        CallContext::new(account("party.factory"), account(caller), now())
    }

    fn args(value: &serde_json::Value) -> Vec<u8> {
        serde_json::to_vec(value).unwrap()
    }

    async fn initialized() -> Arc<dyn Contract> {
        let contract = contract();
        let details = EventDetails::new(
            now().saturating_add(Duration::from_secs(3600)),
            "space",
            "space party",
            "dance",
        );
        contract
            .call(
                ctx("alice").with_deposit(MIN_ACCOUNT_BALANCE),
                "initialize",
                &args(&json!({ "details": details })),
            )
            .await
            .unwrap();
        contract
    }

    #[tokio::test]
    async fn unknown_method() {
        let err = contract().call(ctx("alice"), "go_private", b"{}").await.unwrap_err();
        assert_eq!(err, ContractError::MethodNotFound("go_private".to_string()));

        let err = contract().view(ctx("alice"), "go_public", b"{}").await.unwrap_err();
        assert_eq!(err, ContractError::MethodNotFound("go_public".to_string()));
    }

    #[tokio::test]
    async fn malformed_arguments() {
        let contract = initialized().await;

        let err = contract
            .call(ctx("alice"), "add_cohost", &args(&json!({ "cohost": "A" })))
            .await
            .unwrap_err();
        assert!(matches!(err, ContractError::InvalidArguments { .. }));

        let err = contract.call(ctx("alice"), "set_max_tickets", b"not json").await.unwrap_err();
        assert!(matches!(err, ContractError::InvalidArguments { .. }));
    }

    #[tokio::test]
    async fn rejection_carries_domain_message() {
        let err = contract().call(ctx("alice"), "go_public", b"").await.unwrap_err();
        assert_eq!(
            err,
            ContractError::Execution("Contract must be initialized first".to_string())
        );
    }

    #[tokio::test]
    async fn views_read_committed_state() {
        let contract = initialized().await;

        let host: AccountId =
            serde_json::from_slice(&contract.view(ctx("alice"), "get_host", b"").await.unwrap()).unwrap();
        assert_eq!(host, account("alice"));

        let err = contract.view(ctx("mallory"), "get_host", b"").await.unwrap_err();
        assert_eq!(
            err,
            ContractError::Execution("Only one of the hosts can perform this action".to_string())
        );
    }

    #[tokio::test]
    async fn view_method_sent_as_call_is_read_only() {
        let contract = initialized().await;

        let outcome = contract
            .call(ctx("alice"), "has_ticket", &args(&json!({ "attendee": "alice" })))
            .await
            .unwrap();

        assert!(outcome.settled.is_none());
        assert!(outcome.decode::<bool>().unwrap());
    }

    #[tokio::test]
    async fn change_returns_null() {
        let contract = initialized().await;
        let mut outcome = contract
            .call(ctx("alice"), "set_max_tickets", &args(&json!({ "num": 10 })))
            .await
            .unwrap();

        assert_eq!(outcome.return_value, b"null");
        outcome.settled.take().unwrap().await;

        let max: u32 = serde_json::from_slice(
            &contract.view(ctx("alice"), "get_max_tickets", b"").await.unwrap(),
        )
        .unwrap();
        assert_eq!(max, 10);
    }

    #[tokio::test]
    async fn shutdown_stops_change_calls_but_keeps_views() {
        let contract = initialized().await;

        contract.shutdown(Duration::from_secs(1)).await.unwrap();

        let err = contract
            .call(ctx("alice"), "set_max_tickets", &args(&json!({ "num": 10 })))
            .await
            .unwrap_err();
        assert_eq!(
            err,
            ContractError::Unavailable("Store is shutting down".to_string())
        );

        let max: u32 = serde_json::from_slice(
            &contract.view(ctx("alice"), "get_max_tickets", b"").await.unwrap(),
        )
        .unwrap();
        assert_eq!(max, 0);
    }
}
