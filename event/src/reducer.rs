//! Event contract reducer.
//!
//! Every change method runs against a clone of the committed storage. The
//! clone replaces the committed storage only when the method succeeds, so a
//! failed call leaves no trace besides `last_error`.

use crate::details::EventDetails;
use crate::error::EventError;
use crate::operations::{self, Payout};
use gala_chain::{
    AccountId, Balance, CallContext, ChainConfig, Host, PromiseBatch, PromiseResult, Trie,
};
use gala_core::{SmallVec, effect::Effect, reducer::Reducer, smallvec};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// ============================================================================
// State
// ============================================================================

/// Contract storage plus the outcome of the most recent change call
#[derive(Clone, Debug, Default)]
pub struct EventState {
    /// Committed storage
    pub storage: Trie,
    /// Error of the last change call, `None` if it succeeded
    pub last_error: Option<EventError>,
}

impl EventState {
    /// Empty, uninitialized contract
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

// ============================================================================
// Actions
// ============================================================================

/// Change methods with their JSON arguments
///
/// Serialized as `{"method": "...", "args": {...}}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", content = "args", rename_all = "snake_case")]
pub enum EventCall {
    /// Create the event
    Initialize {
        /// Initial details
        details: EventDetails,
    },
    /// Grant host privileges
    AddCohost {
        /// Account to promote
        cohost: AccountId,
    },
    /// Add to the guest list
    AddGuest {
        /// Account to invite
        guest: AccountId,
    },
    /// Revoke host privileges
    RemoveCohost {
        /// Account to demote
        cohost: AccountId,
    },
    /// Remove from the guest list
    RemoveGuest {
        /// Account to uninvite
        guest: AccountId,
    },
    /// Replace the details
    SetDetails {
        /// New details
        details: EventDetails,
    },
    /// Cap ticket sales
    SetMaxTickets {
        /// Cap; zero for unlimited
        num: u32,
    },
    /// Price tickets
    SetTicketPrice {
        /// Price in yocto
        price: Balance,
    },
    /// Open ticket sales
    GoPublic {},
    /// Buy a ticket with the attached deposit
    BuyTicket {},
    /// Pay out ticket revenue
    PayHosts {},
}

impl EventCall {
    /// Every change method name
    pub const METHODS: [&'static str; 11] = [
        "initialize",
        "add_cohost",
        "add_guest",
        "remove_cohost",
        "remove_guest",
        "set_details",
        "set_max_tickets",
        "set_ticket_price",
        "go_public",
        "buy_ticket",
        "pay_hosts",
    ];

    /// The method name
    #[must_use]
    pub const fn method_name(&self) -> &'static str {
        match self {
            Self::Initialize { .. } => "initialize",
            Self::AddCohost { .. } => "add_cohost",
            Self::AddGuest { .. } => "add_guest",
            Self::RemoveCohost { .. } => "remove_cohost",
            Self::RemoveGuest { .. } => "remove_guest",
            Self::SetDetails { .. } => "set_details",
            Self::SetMaxTickets { .. } => "set_max_tickets",
            Self::SetTicketPrice { .. } => "set_ticket_price",
            Self::GoPublic {} => "go_public",
            Self::BuyTicket {} => "buy_ticket",
            Self::PayHosts {} => "pay_hosts",
        }
    }
}

/// Inputs to the event reducer
#[derive(Clone, Debug)]
pub enum EventAction {
    /// A change method delivered by the host
    Invoke {
        /// Call context
        context: CallContext,
        /// Method and arguments
        call: EventCall,
    },

    /// A payout transfer resolved
    TransferSettled {
        /// Recipient
        payee: AccountId,
        /// Amount sent
        amount: Balance,
        /// Host outcome
        result: PromiseResult,
    },
}

// ============================================================================
// Environment
// ============================================================================

/// Platform dependencies of a deployed event
#[derive(Clone)]
pub struct EventEnvironment {
    /// Executes payout transfers
    pub host: Arc<dyn Host>,
    /// Platform limits
    pub config: ChainConfig,
}

impl EventEnvironment {
    /// Create a new environment
    #[must_use]
    pub fn new(host: Arc<dyn Host>, config: ChainConfig) -> Self {
        Self { host, config }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Reducer for the event contract
#[derive(Clone, Debug, Default)]
pub struct EventReducer;

impl EventReducer {
    /// Create a new reducer
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    fn apply(
        storage: &mut Trie,
        ctx: &CallContext,
        call: EventCall,
        env: &EventEnvironment,
    ) -> Result<Option<Payout>, EventError> {
        match call {
            EventCall::Initialize { details } => {
                operations::initialize(storage, ctx, details, env.config.min_account_balance)?;
            },
            EventCall::AddCohost { cohost } => operations::add_cohost(storage, ctx, &cohost)?,
            EventCall::AddGuest { guest } => operations::add_guest(storage, ctx, &guest)?,
            EventCall::RemoveCohost { cohost } => operations::remove_cohost(storage, ctx, &cohost)?,
            EventCall::RemoveGuest { guest } => operations::remove_guest(storage, ctx, &guest)?,
            EventCall::SetDetails { details } => operations::set_details(storage, ctx, details)?,
            EventCall::SetMaxTickets { num } => operations::set_max_tickets(storage, ctx, num)?,
            EventCall::SetTicketPrice { price } => {
                operations::set_ticket_price(storage, ctx, price)?;
            },
            EventCall::GoPublic {} => operations::go_public(storage, ctx)?,
            EventCall::BuyTicket {} => {
                operations::buy_ticket(storage, ctx)?;
                metrics::counter!("event.tickets.sold").increment(1);
            },
            EventCall::PayHosts {} => return operations::pay_hosts(storage, ctx).map(Some),
        }
        Ok(None)
    }

    /// One transfer per payee, issued in payee order and reported back as `TransferSettled`
    fn payout_effects(payout: Payout, ctx: &CallContext, env: &EventEnvironment) -> Effect<EventAction> {
        let amount = payout.share;
        let transfers = payout
            .payees
            .into_iter()
            .map(|payee| {
                let host = Arc::clone(&env.host);
                let from = ctx.current_account_id.clone();
                let signer = ctx.signer_account_id.clone();
                Effect::Future(Box::pin(async move {
                    let batch = PromiseBatch::new(payee.clone()).transfer(amount);
                    let result = host.execute(from, signer, batch).await;
                    Some(EventAction::TransferSettled {
                        payee,
                        amount,
                        result,
                    })
                }))
            })
            .collect();

        Effect::chain(transfers)
    }
}

impl Reducer for EventReducer {
    type State = EventState;
    type Action = EventAction;
    type Environment = EventEnvironment;

    fn reduce(
        &self,
        state: &mut Self::State,
        action: Self::Action,
        env: &Self::Environment,
    ) -> SmallVec<[Effect<Self::Action>; 4]> {
        match action {
            EventAction::Invoke { context, call } => {
                let method = call.method_name();
                let mut draft = state.storage.clone();

                match Self::apply(&mut draft, &context, call, env) {
                    Ok(payout) => {
                        state.storage = draft;
                        state.last_error = None;

                        tracing::info!(
                            event = %context.current_account_id,
                            caller = %context.signer_account_id,
                            method,
                            "Call committed"
                        );

                        match payout {
                            Some(payout) => {
                                tracing::info!(
                                    payees = payout.payees.len(),
                                    share = %payout.share,
                                    remainder = %payout.remainder,
                                    "Paying hosts"
                                );
                                metrics::counter!("event.payouts.issued").increment(1);
                                smallvec![Self::payout_effects(payout, &context, env)]
                            },
                            None => smallvec![Effect::None],
                        }
                    },
                    Err(error) => {
                        tracing::warn!(
                            event = %context.current_account_id,
                            caller = %context.signer_account_id,
                            method,
                            %error,
                            "Call rejected"
                        );
                        metrics::counter!("event.calls.rejected", "method" => method).increment(1);
                        state.last_error = Some(error);
                        smallvec![Effect::None]
                    },
                }
            },

            EventAction::TransferSettled {
                payee,
                amount,
                result,
            } => {
                if result.is_successful() {
                    tracing::debug!(%payee, %amount, "Payout transfer settled");
                } else {
                    // paid_out is already latched; nothing retries this
                    tracing::error!(
                        %payee,
                        %amount,
                        ?result,
                        "Payout transfer failed, manual intervention required"
                    );
                    metrics::counter!("event.payouts.failed").increment(1);
                }
                smallvec![Effect::None]
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::{Phase, Role};
    use crate::model::Event;
    use gala_chain::constants::MIN_ACCOUNT_BALANCE;
    use gala_chain::{Storage, Timestamp};
    use gala_testing::{RecordingHost, ReducerTest, assertions};
    use std::time::Duration;

    const DAY: Duration = Duration::from_secs(24 * 60 * 60);

    fn account(id: &str) -> AccountId {
        AccountId::new(id).unwrap()
    }

    fn now() -> Timestamp {
        Timestamp::from_datetime(gala_testing::test_epoch())
    }

    fn details() -> EventDetails {
        EventDetails::new(now().saturating_add(30 * DAY), "space", "space party", "dance")
    }

    fn env() -> EventEnvironment {
        EventEnvironment::new(Arc::new(RecordingHost::new()), ChainConfig::default())
    }

    fn ctx(caller: &str) -> CallContext {
        CallContext::new(account("party.factory"), account(caller), now())
    }

    fn invoke(caller: &str, call: EventCall) -> EventAction {
        EventAction::Invoke {
            context: ctx(caller),
            call,
        }
    }

    fn initialize() -> EventAction {
        EventAction::Invoke {
            context: ctx("alice").with_deposit(MIN_ACCOUNT_BALANCE),
            call: EventCall::Initialize { details: details() },
        }
    }

    #[test]
    fn initialize_persists_caller_as_host() {
        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::new())
            .when_action(initialize())
            .then_state(|state| {
                assert_eq!(state.last_error, None);
                let event = Event::load(&state.storage).unwrap();
                assert_eq!(event.host, account("alice"));
                assert!(!event.public);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[test]
    fn initialize_twice_is_rejected() {
        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::new())
            .given_action(initialize())
            .when_action(initialize())
            .then_state(|state| {
                assert_eq!(state.last_error, Some(EventError::AlreadyInitialized));
            })
            .run();
    }

    #[test]
    fn initialize_requires_minimum_deposit() {
        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::new())
            .when_action(invoke("alice", EventCall::Initialize { details: details() }))
            .then_state(|state| {
                assert!(matches!(
                    state.last_error,
                    Some(EventError::InsufficientDeposit { .. })
                ));
                assert!(state.storage.is_empty());
            })
            .run();
    }

    #[test]
    fn rejected_call_rolls_back_everything() {
        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::new())
            .given_action(initialize())
            .when_action(invoke(
                "bob",
                EventCall::AddCohost {
                    cohost: account("bob"),
                },
            ))
            .then_state(|state| {
                assert_eq!(state.last_error, Some(EventError::Unauthorized(Role::Host)));
                assert!(Event::cohosts(&state.storage).unwrap().is_empty());
            })
            .run();
    }

    #[test]
    fn success_clears_previous_error() {
        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::new())
            .given_action(invoke("alice", EventCall::GoPublic {}))
            .given_action(initialize())
            .when_action(invoke("alice", EventCall::GoPublic {}))
            .then_state(|state| {
                assert_eq!(state.last_error, None);
                assert!(Event::load(&state.storage).unwrap().public);
            })
            .run();
    }

    #[test]
    fn settings_locked_after_going_public() {
        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(EventState::new())
            .given_action(initialize())
            .given_action(invoke("alice", EventCall::GoPublic {}))
            .when_action(invoke("alice", EventCall::SetMaxTickets { num: 5 }))
            .then_state(|state| {
                assert_eq!(state.last_error, Some(EventError::InvalidState(Phase::Private)));
                assert_eq!(Event::load(&state.storage).unwrap().max_tickets, 0);
            })
            .run();
    }

    #[test]
    fn pay_hosts_issues_one_transfer_per_host() {
        let mut state = EventState::new();
        let env = env();
        let reducer = EventReducer::new();

        reducer.reduce(&mut state, initialize(), &env);
        reducer.reduce(
            &mut state,
            invoke("alice", EventCall::AddCohost { cohost: account("bob") }),
            &env,
        );
        reducer.reduce(&mut state, invoke("alice", EventCall::GoPublic {}), &env);
        reducer.reduce(
            &mut state,
            EventAction::Invoke {
                context: ctx("david").with_deposit(Balance::from_yocto(10)),
                call: EventCall::BuyTicket {},
            },
            &env,
        );
        assert_eq!(state.last_error, None);

        let after_event = CallContext::new(
            account("party.factory"),
            account("alice"),
            now().saturating_add(31 * DAY),
        );

        ReducerTest::new(reducer)
            .with_env(env)
            .given_state(state)
            .when_action(EventAction::Invoke {
                context: after_event,
                call: EventCall::PayHosts {},
            })
            .then_state(|state| {
                assert_eq!(state.last_error, None);
                assert!(Event::load(&state.storage).unwrap().paid_out);
            })
            .then_effects(|effects| {
                assertions::assert_effects_count(effects, 1);
                assertions::assert_future_count(effects, 2);
            })
            .run();
    }

    #[test]
    fn failed_transfer_changes_nothing() {
        let mut state = EventState::new();
        EventReducer::new().reduce(&mut state, initialize(), &env());
        let before = state.storage.clone();

        ReducerTest::new(EventReducer::new())
            .with_env(env())
            .given_state(state)
            .when_action(EventAction::TransferSettled {
                payee: account("alice"),
                amount: Balance::from_yocto(5),
                result: PromiseResult::Failed,
            })
            .then_state(move |state| {
                assert_eq!(state.storage, before);
                assert_eq!(state.last_error, None);
            })
            .then_effects(assertions::assert_no_effects)
            .run();
    }

    #[tokio::test]
    async fn payout_effect_reports_transfer_outcome() {
        let host = Arc::new(RecordingHost::failing());
        let env = EventEnvironment::new(host.clone(), ChainConfig::default());
        let payout = Payout {
            payees: vec![account("alice")],
            share: Balance::from_yocto(7),
            remainder: Balance::ZERO,
        };

        let Effect::Sequential(mut effects) = EventReducer::payout_effects(payout, &ctx("alice"), &env)
        else {
            unreachable!("payout is always a sequential group");
        };
        let Some(Effect::Future(transfer)) = effects.pop() else {
            unreachable!("one future per payee");
        };

        let Some(EventAction::TransferSettled { payee, amount, result }) = transfer.await else {
            unreachable!("transfers always report back");
        };
        assert_eq!(payee, account("alice"));
        assert_eq!(amount, Balance::from_yocto(7));
        assert_eq!(result, PromiseResult::Failed);

        let batches = host.batches();
        assert_eq!(batches.len(), 1);
        assert_eq!(batches[0].0, account("party.factory"));
        assert_eq!(batches[0].1.receiver_id, account("alice"));
        assert_eq!(batches[0].1.total_deposit(), Balance::from_yocto(7));
        assert_eq!(host.signers(), vec![account("alice")]);
    }

    #[tokio::test]
    async fn payout_pays_host_before_cohosts() {
        let host = Arc::new(RecordingHost::new());
        let env = EventEnvironment::new(host.clone(), ChainConfig::default());
        let payout = Payout {
            payees: vec![account("alice"), account("bob"), account("carol")],
            share: Balance::from_yocto(3),
            remainder: Balance::ZERO,
        };

        let Effect::Sequential(effects) = EventReducer::payout_effects(payout, &ctx("alice"), &env) else {
            unreachable!("payout is always a sequential group");
        };
        assert_eq!(effects.len(), 3);

        let mut settled = Vec::new();
        for effect in effects {
            let Effect::Future(transfer) = effect else {
                unreachable!("one future per payee");
            };
            if let Some(EventAction::TransferSettled { payee, .. }) = transfer.await {
                settled.push(payee);
            }
        }

        let receivers: Vec<_> = host
            .batches()
            .into_iter()
            .map(|(_, batch)| batch.receiver_id)
            .collect();
        assert_eq!(receivers, vec![account("alice"), account("bob"), account("carol")]);
        assert_eq!(settled, receivers);
    }

    #[test]
    fn call_json_shape() {
        let call: EventCall = serde_json::from_str(
            r#"{"method":"set_ticket_price","args":{"price":"1000"}}"#,
        )
        .unwrap();
        assert_eq!(
            call,
            EventCall::SetTicketPrice {
                price: Balance::from_yocto(1000)
            }
        );

        let call: EventCall = serde_json::from_str(r#"{"method":"go_public","args":{}}"#).unwrap();
        assert_eq!(call.method_name(), "go_public");
        assert!(EventCall::METHODS.contains(&call.method_name()));
    }

    #[test]
    fn storage_is_untouched_until_initialize() {
        let mut state = EventState::new();
        EventReducer::new().reduce(&mut state, invoke("alice", EventCall::BuyTicket {}), &env());

        assert_eq!(state.last_error, Some(EventError::NotInitialized));
        assert!(!state.storage.has_key(b"ev"));
    }
}
