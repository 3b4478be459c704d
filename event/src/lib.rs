//! # Gala Event
//!
//! A single event deployed to its own account.
//!
//! ## Roles
//!
//! - **Host**: the account that called `initialize`. Manages cohosts,
//!   configures the event, and collects revenue.
//! - **Cohosts**: manage the guest list and read the event while it is private.
//! - **Guests**: attend for free.
//! - **Attendees**: anyone who bought a ticket once the event went public.
//!
//! ## Lifecycle
//!
//! ```text
//! initialize ─► private (configure, invite) ─► go_public ─► ticket sales ─► date ─► pay_hosts
//! ```
//!
//! Configuration is frozen by `go_public`; revenue is paid out at most once.
//!
//! ## Layout
//!
//! - [`operations`]: guard-then-mutate functions over [`gala_chain::Storage`]
//! - [`reducer`]: transactional wrapper that emits payout transfers as effects
//! - [`contract`]: the deployable [`EventCode`] speaking the host's JSON calling convention

pub mod contract;
pub mod details;
pub mod error;
mod guards;
pub mod model;
pub mod operations;
pub mod reducer;

pub use contract::{EventCode, EventContract, EventQuery};
pub use details::EventDetails;
pub use error::{DetailsError, EventError, Phase, Role};
pub use model::{Event, EventView, Ticket};
pub use operations::Payout;
pub use reducer::{EventAction, EventCall, EventEnvironment, EventReducer, EventState};
