//! Scripted walkthrough of the Gala contracts on the sandbox chain.
//!
//! Alice creates "spaceparty" through the factory, makes Bob a cohost, Bob
//! invites Carol, David buys the only paid ticket, and after the party Alice
//! splits the revenue with Bob.

use anyhow::{Context, bail};
use gala_chain::{AccountId, Balance};
use gala_event::{EventDetails, EventView};
use gala_factory::FactoryCode;
use gala_testing::{Sandbox, SandboxError};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

const DAY: Duration = Duration::from_secs(24 * 60 * 60);

/// Name of the event created by the walkthrough
pub const EVENT_NAME: &str = "spaceparty";

/// Everything the walkthrough observed
#[derive(Debug)]
pub struct Report {
    /// Factory registry after the run
    pub event_names: Vec<String>,
    /// Event as an attendee sees it after the sale
    pub event: EventView,
    /// Messages of the calls that were expected to fail, in order
    pub rejections: Vec<String>,
    /// Host balance after the payout
    pub host_balance: Balance,
    /// Cohost balance after the payout
    pub cohost_balance: Balance,
}

struct Cast {
    factory: AccountId,
    alice: AccountId,
    bob: AccountId,
    carol: AccountId,
    david: AccountId,
}

fn cast(sandbox: &Sandbox) -> anyhow::Result<Cast> {
    let factory = sandbox.create_account("factory.gala", Balance::ZERO)?;
    sandbox.deploy(&factory, Arc::new(FactoryCode::default()))?;

    Ok(Cast {
        factory,
        alice: sandbox.create_account("alice.gala", Balance::from_near(100))?,
        bob: sandbox.create_account("bob.gala", Balance::from_near(10))?,
        carol: sandbox.create_account("carol.gala", Balance::from_near(10))?,
        david: sandbox.create_account("david.gala", Balance::from_near(50))?,
    })
}

/// Message of a call that must be rejected by the contract
fn rejection<T>(result: Result<T, SandboxError>) -> anyhow::Result<String> {
    match result {
        Ok(_) => bail!("call unexpectedly succeeded"),
        Err(error) => match error.execution_message() {
            Some(message) => Ok(message.to_string()),
            None => Err(error).context("call failed outside the contract"),
        },
    }
}

async fn change<T: Serialize + ?Sized>(
    sandbox: &Sandbox,
    signer: &AccountId,
    receiver: &AccountId,
    method: &str,
    args: &T,
    deposit: Balance,
) -> anyhow::Result<()> {
    sandbox
        .transact(signer, receiver, method, args, deposit)
        .await
        .with_context(|| format!("{signer} calling {method} on {receiver}"))?;
    tracing::info!(%signer, method, "ok");
    Ok(())
}

/// Run the walkthrough on `sandbox`
///
/// # Errors
///
/// Fails if any step deviates from the script.
pub async fn run(sandbox: &Sandbox) -> anyhow::Result<Report> {
    let min_balance = sandbox.config().min_account_balance;
    let Cast {
        factory,
        alice,
        bob,
        carol,
        david,
    } = cast(sandbox)?;
    let mut rejections = Vec::new();

    let details = EventDetails::new(
        sandbox.block_timestamp().saturating_add(7 * DAY),
        "Moon base",
        "Space party",
        "Dancing in low gravity",
    )
    .with_image_url("https://example.com/moon.png");

    // Factory
    tracing::info!(name = EVENT_NAME, "Creating event");
    let create = json!({ "name": EVENT_NAME, "details": details });
    change(sandbox, &alice, &factory, "create_event", &create, min_balance).await?;

    rejections.push(rejection(
        sandbox.transact(&bob, &factory, "create_event", &create, min_balance).await,
    )?);
    rejections.push(rejection(
        sandbox
            .transact(
                &bob,
                &factory,
                "create_event",
                &json!({ "name": "_", "details": details }),
                min_balance,
            )
            .await,
    )?);

    let event_names: Vec<String> = sandbox.view(&alice, &factory, "get_event_names", &json!({})).await?;
    let event = AccountId::new(format!("{EVENT_NAME}.{factory}"))?;

    // Private setup
    change(sandbox, &alice, &event, "add_cohost", &json!({ "cohost": bob }), Balance::ZERO).await?;
    change(sandbox, &bob, &event, "add_guest", &json!({ "guest": carol }), Balance::ZERO).await?;
    change(sandbox, &alice, &event, "set_max_tickets", &json!({ "num": 1 }), Balance::ZERO).await?;
    let price = Balance::from_near(4);
    change(sandbox, &alice, &event, "set_ticket_price", &json!({ "price": price }), Balance::ZERO).await?;

    rejections.push(rejection(
        sandbox.transact(&david, &event, "buy_ticket", &json!({}), price).await,
    )?);

    // Sales
    change(sandbox, &alice, &event, "go_public", &json!({}), Balance::ZERO).await?;
    rejections.push(rejection(
        sandbox.transact(&carol, &event, "buy_ticket", &json!({}), price).await,
    )?);
    change(sandbox, &david, &event, "buy_ticket", &json!({}), price).await?;

    let view: EventView = sandbox.view(&david, &event, "get_event", &json!({})).await?;
    tracing::info!(sold = view.tickets_sold, max = view.max_tickets, "Sales closed");

    // Payout
    rejections.push(rejection(
        sandbox.transact(&alice, &event, "pay_hosts", &json!({}), Balance::ZERO).await,
    )?);
    sandbox.advance(8 * DAY);
    change(sandbox, &alice, &event, "pay_hosts", &json!({}), Balance::ZERO).await?;

    Ok(Report {
        event_names,
        event: view,
        rejections,
        host_balance: sandbox.balance(&alice)?,
        cohost_balance: sandbox.balance(&bob)?,
    })
}
