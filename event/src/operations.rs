//! Contract methods as guard-then-mutate functions over storage.
//!
//! Each function takes the storage it should act on and the call context.
//! The caller is the transaction signer, so an event created through the
//! factory is hosted by the account that asked for it.
//! Mutating functions write straight into that storage; the reducer hands
//! them a draft and commits it only when they return `Ok`.

use crate::details::EventDetails;
use crate::error::{EventError, Result};
use crate::model::{COHOSTS, Event, EventView, GUESTS, TICKETS, Ticket};
use gala_chain::{AccountId, Balance, CallContext, Storage};

// ============================================================================
// Lifecycle
// ============================================================================

/// Create the event with the caller as host
///
/// # Errors
///
/// [`EventError::AlreadyInitialized`], [`EventError::InsufficientDeposit`],
/// [`EventError::InvalidDetails`]
pub fn initialize<S: Storage + ?Sized>(
    storage: &mut S,
    ctx: &CallContext,
    details: EventDetails,
    min_account_balance: Balance,
) -> Result<()> {
    if Event::exists(storage) {
        return Err(EventError::AlreadyInitialized);
    }
    if ctx.attached_deposit < min_account_balance {
        return Err(EventError::InsufficientDeposit {
            attached: ctx.attached_deposit,
            required: min_account_balance,
        });
    }
    details.assert_valid(ctx.block_timestamp)?;

    Event::new(ctx.signer_account_id.clone(), details).save(storage)
}

// ============================================================================
// Views
// ============================================================================

/// Full read projection
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`]
pub fn get_event<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<EventView> {
    let event = visible_event(storage, ctx)?;
    Ok(EventView {
        cohosts: Event::cohosts(storage)?,
        tickets_sold: Event::tickets_sold(storage),
        host: event.host,
        max_tickets: event.max_tickets,
        ticket_price: event.ticket_price,
        public: event.public,
        details: event.details,
    })
}

/// The host account
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`]
pub fn get_host<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<AccountId> {
    Ok(visible_event(storage, ctx)?.host)
}

/// The cohost accounts
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`]
pub fn get_cohosts<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<Vec<AccountId>> {
    visible_event(storage, ctx)?;
    Event::cohosts(storage)
}

/// The event details
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`]
pub fn get_details<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<EventDetails> {
    Ok(visible_event(storage, ctx)?.details)
}

/// The ticket price
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`]
pub fn get_ticket_price<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<Balance> {
    Ok(visible_event(storage, ctx)?.ticket_price)
}

/// The ticket cap
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`]
pub fn get_max_tickets<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<u32> {
    Ok(visible_event(storage, ctx)?.max_tickets)
}

/// Tickets sold; hosts only
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`]
pub fn get_tickets_sold<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<u32> {
    let event = Event::load(storage)?;
    event.assert_cohost(storage, &ctx.signer_account_id)?;
    Ok(Event::tickets_sold(storage))
}

/// Whether `attendee` may attend: insiders and ticket holders
///
/// # Errors
///
/// [`EventError::NotInitialized`]
pub fn has_ticket<S: Storage + ?Sized>(storage: &S, attendee: &AccountId) -> Result<bool> {
    Event::load(storage)?.has_ticket(storage, attendee)
}

fn visible_event<S: Storage + ?Sized>(storage: &S, ctx: &CallContext) -> Result<Event> {
    let event = Event::load(storage)?;
    event.assert_public_or_cohost(storage, &ctx.signer_account_id)?;
    Ok(event)
}

// ============================================================================
// Membership
// ============================================================================

/// Grant host privileges; host only, before the event
///
/// Adding the host is a no-op: the host is privileged implicitly.
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`], [`EventError::EventEnded`]
pub fn add_cohost<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext, cohost: &AccountId) -> Result<()> {
    let event = Event::load(storage)?;
    event.assert_host(&ctx.signer_account_id)?;
    event.assert_upcoming(ctx.block_timestamp)?;

    if *cohost != event.host {
        COHOSTS.insert(storage, cohost)?;
    }
    Ok(())
}

/// Put an account on the guest list; hosts only, before the event
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`], [`EventError::EventEnded`]
pub fn add_guest<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext, guest: &AccountId) -> Result<()> {
    let event = Event::load(storage)?;
    event.assert_cohost(storage, &ctx.signer_account_id)?;
    event.assert_upcoming(ctx.block_timestamp)?;

    if *guest != event.host {
        GUESTS.insert(storage, guest)?;
    }
    Ok(())
}

/// Revoke host privileges; host only, before the event
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`], [`EventError::EventEnded`]
pub fn remove_cohost<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext, cohost: &AccountId) -> Result<()> {
    let event = Event::load(storage)?;
    event.assert_host(&ctx.signer_account_id)?;
    event.assert_upcoming(ctx.block_timestamp)?;

    COHOSTS.remove(storage, cohost)?;
    Ok(())
}

/// Take an account off the guest list; hosts only, before the event
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`], [`EventError::EventEnded`]
pub fn remove_guest<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext, guest: &AccountId) -> Result<()> {
    let event = Event::load(storage)?;
    event.assert_cohost(storage, &ctx.signer_account_id)?;
    event.assert_upcoming(ctx.block_timestamp)?;

    GUESTS.remove(storage, guest)?;
    Ok(())
}

// ============================================================================
// Configuration
// ============================================================================

/// Replace the details; hosts only, before the event
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`],
/// [`EventError::EventEnded`], [`EventError::InvalidDetails`]
pub fn set_details<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext, details: EventDetails) -> Result<()> {
    let mut event = Event::load(storage)?;
    event.assert_cohost(storage, &ctx.signer_account_id)?;
    event.assert_upcoming(ctx.block_timestamp)?;
    details.assert_valid(ctx.block_timestamp)?;

    event.details = details;
    event.save(storage)
}

/// Cap ticket sales; hosts only, while private
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`], [`EventError::InvalidState`]
pub fn set_max_tickets<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext, num: u32) -> Result<()> {
    let mut event = Event::load(storage)?;
    event.assert_cohost(storage, &ctx.signer_account_id)?;
    event.assert_private()?;

    event.max_tickets = num;
    event.save(storage)
}

/// Price tickets; hosts only, while private
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`], [`EventError::InvalidState`]
pub fn set_ticket_price<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext, price: Balance) -> Result<()> {
    let mut event = Event::load(storage)?;
    event.assert_cohost(storage, &ctx.signer_account_id)?;
    event.assert_private()?;

    event.ticket_price = price;
    event.save(storage)
}

/// Open ticket sales; irreversible
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`],
/// [`EventError::InvalidState`], [`EventError::EventEnded`]
pub fn go_public<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext) -> Result<()> {
    let mut event = Event::load(storage)?;
    event.assert_cohost(storage, &ctx.signer_account_id)?;
    event.assert_private()?;
    event.assert_upcoming(ctx.block_timestamp)?;

    event.public = true;
    event.save(storage)
}

// ============================================================================
// Sales and payout
// ============================================================================

/// Issue a ticket to the caller against the attached deposit
///
/// The full deposit counts as revenue, including any overpayment.
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::EventEnded`],
/// [`EventError::InvalidState`], [`EventError::Unauthorized`],
/// [`EventError::AlreadyTicketed`], [`EventError::SoldOut`],
/// [`EventError::InsufficientPayment`], [`EventError::RevenueOverflow`]
pub fn buy_ticket<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext) -> Result<Ticket> {
    let mut event = Event::load(storage)?;
    let buyer = &ctx.signer_account_id;

    event.assert_upcoming(ctx.block_timestamp)?;
    event.assert_public()?;
    event.assert_not_guest(storage, buyer)?;
    if event.has_ticket(storage, buyer)? {
        return Err(EventError::AlreadyTicketed);
    }
    if event.max_tickets > 0 && Event::tickets_sold(storage) >= event.max_tickets {
        return Err(EventError::SoldOut);
    }
    event.assert_paid(ctx.attached_deposit)?;

    event.ticket_revenue = event
        .ticket_revenue
        .checked_add(ctx.attached_deposit)
        .ok_or(EventError::RevenueOverflow)?;
    let ticket = Ticket {
        owner: buyer.clone(),
    };
    TICKETS.insert(storage, &ticket)?;
    event.save(storage)?;
    Ok(ticket)
}

/// Transfers owed by `pay_hosts`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Payout {
    /// Host first, then cohosts in enumeration order
    pub payees: Vec<AccountId>,
    /// Amount each payee receives
    pub share: Balance,
    /// Left in the contract by floor division
    pub remainder: Balance,
}

/// Split revenue evenly across host and cohosts; latches `paid_out`
///
/// # Errors
///
/// [`EventError::NotInitialized`], [`EventError::Unauthorized`],
/// [`EventError::EventNotEnded`], [`EventError::NoRevenue`], [`EventError::AlreadyPaid`]
pub fn pay_hosts<S: Storage + ?Sized>(storage: &mut S, ctx: &CallContext) -> Result<Payout> {
    let mut event = Event::load(storage)?;

    event.assert_host(&ctx.signer_account_id)?;
    if event.details.date >= ctx.block_timestamp {
        return Err(EventError::EventNotEnded);
    }
    if event.ticket_revenue.is_zero() {
        return Err(EventError::NoRevenue);
    }
    if event.paid_out {
        return Err(EventError::AlreadyPaid);
    }

    let mut payees = vec![event.host.clone()];
    payees.extend(Event::cohosts(storage)?);

    let share = event.ticket_revenue.share(payees.len() as u128);
    let paid = share.as_yocto().saturating_mul(payees.len() as u128);
    let remainder = Balance::from_yocto(event.ticket_revenue.as_yocto().saturating_sub(paid));

    event.paid_out = true;
    event.save(storage)?;

    Ok(Payout {
        payees,
        share,
        remainder,
    })
}
