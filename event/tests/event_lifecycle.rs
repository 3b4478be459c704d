//! Event contract driven end to end through the sandbox chain.

#![allow(clippy::unwrap_used)]

use gala_chain::constants::MIN_ACCOUNT_BALANCE;
use gala_chain::{AccountId, Balance, ContractError};
use gala_event::{EventCode, EventDetails, EventView};
use gala_testing::{Sandbox, SandboxError};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

struct Party {
    sandbox: Sandbox,
    event: AccountId,
    alice: AccountId,
    bob: AccountId,
    carol: AccountId,
    david: AccountId,
}

impl Party {
    async fn call(
        &self,
        who: &AccountId,
        method: &str,
        args: serde_json::Value,
        deposit: Balance,
    ) -> Result<(), SandboxError> {
        self.sandbox
            .transact(who, &self.event, method, &args, deposit)
            .await
            .map(|_| ())
    }

    async fn has_ticket(&self, attendee: &AccountId) -> bool {
        self.sandbox
            .view(&self.david, &self.event, "has_ticket", &json!({ "attendee": attendee }))
            .await
            .unwrap()
    }
}

fn details(sandbox: &Sandbox) -> EventDetails {
    EventDetails::new(
        sandbox.block_timestamp().saturating_add(7 * DAY),
        "Moon base",
        "Space party",
        "Dancing in low gravity",
    )
}

/// Event deployed and initialized by alice; bob is a cohost
async fn setup() -> Party {
    let sandbox = Sandbox::new();
    let event = sandbox.create_account("party.test", Balance::ZERO).unwrap();
    sandbox.deploy(&event, Arc::new(EventCode)).unwrap();

    let party = Party {
        alice: sandbox.create_account("alice.test", Balance::from_near(100)).unwrap(),
        bob: sandbox.create_account("bob.test", Balance::from_near(50)).unwrap(),
        carol: sandbox.create_account("carol.test", Balance::from_near(50)).unwrap(),
        david: sandbox.create_account("david.test", Balance::from_near(50)).unwrap(),
        event,
        sandbox,
    };

    let details = details(&party.sandbox);
    party
        .call(&party.alice, "initialize", json!({ "details": details }), MIN_ACCOUNT_BALANCE)
        .await
        .unwrap();
    party
        .call(&party.alice, "add_cohost", json!({ "cohost": party.bob }), Balance::ZERO)
        .await
        .unwrap();
    party
}

fn message(result: Result<(), SandboxError>) -> String {
    result.unwrap_err().execution_message().unwrap().to_string()
}

#[tokio::test]
async fn initialize_only_once() {
    let party = setup().await;
    let details = details(&party.sandbox);

    let err = party
        .call(&party.carol, "initialize", json!({ "details": details }), MIN_ACCOUNT_BALANCE)
        .await;
    assert_eq!(message(err), "Contract is already initialized");

    // The rejected deposit came back
    assert_eq!(party.sandbox.balance(&party.carol).unwrap(), Balance::from_near(50));
}

#[tokio::test]
async fn hosts_guests_and_attendees() {
    let party = setup().await;

    party
        .call(&party.bob, "add_guest", json!({ "guest": party.carol }), Balance::ZERO)
        .await
        .unwrap();
    assert!(party.has_ticket(&party.alice).await);
    assert!(party.has_ticket(&party.bob).await);
    assert!(party.has_ticket(&party.carol).await);
    assert!(!party.has_ticket(&party.david).await);

    // Private events are invisible to outsiders and closed for sales
    let err = party
        .sandbox
        .view::<_, EventView>(&party.david, &party.event, "get_event", &json!({}))
        .await
        .unwrap_err();
    assert_eq!(
        err.execution_message(),
        Some("Only one of the hosts can perform this action")
    );
    let err = party.call(&party.david, "buy_ticket", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "The event must be public to perform this action");

    party
        .call(&party.alice, "set_ticket_price", json!({ "price": Balance::from_near(1) }), Balance::ZERO)
        .await
        .unwrap();
    party.call(&party.alice, "go_public", json!({}), Balance::ZERO).await.unwrap();

    let err = party.call(&party.carol, "buy_ticket", json!({}), Balance::from_near(1)).await;
    assert_eq!(message(err), "Only someone not attending can perform this action");

    party
        .call(&party.david, "buy_ticket", json!({}), Balance::from_near(1))
        .await
        .unwrap();
    assert!(party.has_ticket(&party.david).await);

    let view: EventView = party
        .sandbox
        .view(&party.david, &party.event, "get_event", &json!({}))
        .await
        .unwrap();
    assert_eq!(view.host, party.alice);
    assert_eq!(view.cohosts, vec![party.bob.clone()]);
    assert_eq!(view.tickets_sold, 1);
    assert!(view.public);
}

#[tokio::test]
async fn configuration_locked_after_going_public() {
    let party = setup().await;
    party.call(&party.alice, "go_public", json!({}), Balance::ZERO).await.unwrap();

    let err = party
        .call(&party.alice, "set_max_tickets", json!({ "num": 3 }), Balance::ZERO)
        .await;
    assert_eq!(message(err), "This action can only be done before the event goes public");

    let err = party
        .call(&party.alice, "set_ticket_price", json!({ "price": Balance::from_near(1) }), Balance::ZERO)
        .await;
    assert_eq!(message(err), "This action can only be done before the event goes public");

    let err = party.call(&party.alice, "go_public", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "This action can only be done before the event goes public");

    // Details and the guest list stay open
    let details = details(&party.sandbox).with_image_url("https://example.com/moon.png");
    party
        .call(&party.alice, "set_details", json!({ "details": details }), Balance::ZERO)
        .await
        .unwrap();
    let stored: EventDetails = party
        .sandbox
        .view(&party.david, &party.event, "get_details", &json!({}))
        .await
        .unwrap();
    assert_eq!(stored, details);


    party
        .call(&party.bob, "add_guest", json!({ "guest": party.carol }), Balance::ZERO)
        .await
        .unwrap();
}

#[tokio::test]
async fn sold_out() {
    let party = setup().await;
    party
        .call(&party.alice, "set_max_tickets", json!({ "num": 1 }), Balance::ZERO)
        .await
        .unwrap();
    party.call(&party.alice, "go_public", json!({}), Balance::ZERO).await.unwrap();

    party.call(&party.david, "buy_ticket", json!({}), Balance::ZERO).await.unwrap();
    let err = party.call(&party.carol, "buy_ticket", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "This event is sold out");

    let err = party.call(&party.david, "buy_ticket", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "You already have a ticket");
}

#[tokio::test]
async fn revenue_split_between_hosts() {
    let party = setup().await;
    party
        .call(&party.alice, "set_ticket_price", json!({ "price": Balance::from_near(10) }), Balance::ZERO)
        .await
        .unwrap();
    party.call(&party.alice, "go_public", json!({}), Balance::ZERO).await.unwrap();
    party
        .call(&party.david, "buy_ticket", json!({}), Balance::from_near(10))
        .await
        .unwrap();

    let err = party.call(&party.alice, "pay_hosts", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "The event must have passed to pay the hosts");

    party.sandbox.advance(8 * DAY);

    let err = party.call(&party.bob, "pay_hosts", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "Only the host can perform this action");

    party.call(&party.alice, "pay_hosts", json!({}), Balance::ZERO).await.unwrap();

    assert_eq!(party.sandbox.balance(&party.alice).unwrap(), Balance::from_near(102));
    assert_eq!(party.sandbox.balance(&party.bob).unwrap(), Balance::from_near(55));
    assert_eq!(party.sandbox.balance(&party.event).unwrap(), MIN_ACCOUNT_BALANCE);

    let err = party.call(&party.alice, "pay_hosts", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "The hosts have already been paid");
}

#[tokio::test]
async fn free_event_has_nothing_to_pay() {
    let party = setup().await;
    party.call(&party.alice, "go_public", json!({}), Balance::ZERO).await.unwrap();
    party.call(&party.david, "buy_ticket", json!({}), Balance::ZERO).await.unwrap();
    party.sandbox.advance(8 * DAY);

    let err = party.call(&party.alice, "pay_hosts", json!({}), Balance::ZERO).await;
    assert_eq!(message(err), "This event had no ticket revenue");
}

#[tokio::test]
async fn shut_down_event_still_answers_views() {
    let party = setup().await;
    party.call(&party.alice, "go_public", json!({}), Balance::ZERO).await.unwrap();
    party.call(&party.carol, "buy_ticket", json!({}), Balance::ZERO).await.unwrap();

    party.sandbox.shutdown(Duration::from_secs(1)).await.unwrap();

    let err = party
        .call(&party.david, "buy_ticket", json!({}), Balance::from_near(1))
        .await
        .unwrap_err();
    assert!(matches!(err, SandboxError::Contract(ContractError::Unavailable(_))));
    assert_eq!(party.sandbox.balance(&party.david).unwrap(), Balance::from_near(50));

    assert!(party.has_ticket(&party.carol).await);
    assert!(!party.has_ticket(&party.david).await);
}
