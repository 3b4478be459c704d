//! Gala demo binary
//!
//! Runs the walkthrough on an in-memory chain with structured logging.
//! Limits can be overridden with `GALA_MIN_ACCOUNT_BALANCE` and `GALA_XCC_GAS`,
//! read from the environment or a `.env` file.

use gala_chain::ChainConfig;
use gala_core::environment::{Clock, SystemClock};
use gala_testing::Sandbox;
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "gala_demo=info,gala_event=info,gala_factory=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = ChainConfig::from_env();
    tracing::info!(
        min_account_balance = %config.min_account_balance,
        xcc_gas = config.xcc_gas.as_units(),
        "Starting sandbox"
    );

    let sandbox = Sandbox::starting_at(config, SystemClock.now());
    let report = gala_demo::run(&sandbox).await?;

    println!("=== Gala walkthrough ===\n");
    println!("Registered events: {:?}", report.event_names);
    println!(
        "{} at {}: {}/{} tickets sold",
        report.event.details.title,
        report.event.details.location,
        report.event.tickets_sold,
        report.event.max_tickets,
    );
    println!("\nRejected along the way:");
    for message in &report.rejections {
        println!("  • {message}");
    }
    println!("\nHost balance:   {} yocto", report.host_balance);
    println!("Cohost balance: {} yocto", report.cohost_balance);

    sandbox.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}
