//! Factory methods over storage.

use crate::error::{FactoryError, Result};
use crate::workflow::{DEPLOYMENTS, Deployment, DeploymentStatus, REGISTRY};
use gala_chain::{AccountId, Balance, CallContext, PromiseResult, Storage};

/// Sub-account id for `name` under `factory`
///
/// # Errors
///
/// [`FactoryError::InvalidName`] if `name` spans more than one segment or the
/// resulting id breaks account naming rules.
pub fn event_account(factory: &AccountId, name: &str) -> Result<AccountId> {
    if name.contains('.') {
        return Err(FactoryError::InvalidName {
            name: name.to_string(),
        });
    }
    factory
        .sub_account(name)
        .map_err(|_| FactoryError::InvalidName {
            name: name.to_string(),
        })
}

/// Accept a deployment request and record it as `Requested`
///
/// # Errors
///
/// [`FactoryError::InvalidName`], [`FactoryError::NameTaken`],
/// [`FactoryError::InsufficientDeposit`]
pub fn request_deployment<S: Storage + ?Sized>(
    storage: &mut S,
    ctx: &CallContext,
    name: &str,
    min_account_balance: Balance,
) -> Result<Deployment> {
    let account_id = event_account(&ctx.current_account_id, name)?;

    let key = name.to_string();
    let in_flight = DEPLOYMENTS
        .get(storage, &key)?
        .is_some_and(|existing| existing.status.is_in_flight());
    if in_flight || REGISTRY.contains(storage, &key)? {
        return Err(FactoryError::NameTaken { name: key });
    }

    if ctx.attached_deposit < min_account_balance {
        return Err(FactoryError::InsufficientDeposit {
            attached: ctx.attached_deposit,
            required: min_account_balance,
        });
    }

    let deployment = Deployment::requested(key, account_id, ctx.block_timestamp, ctx.attached_deposit);
    DEPLOYMENTS.insert(storage, &deployment.name, &deployment)?;
    Ok(deployment)
}

/// Mark the request for `name` as issued
///
/// # Errors
///
/// [`FactoryError::InvalidTransition`] unless the record is `Requested`.
pub fn start_deployment<S: Storage + ?Sized>(storage: &mut S, mut deployment: Deployment) -> Result<Deployment> {
    deployment.transition(DeploymentStatus::Deploying)?;
    DEPLOYMENTS.insert(storage, &deployment.name, &deployment)?;
    Ok(deployment)
}

/// Resolve the deployment for `name` from the first promise result
///
/// Returns the status the deployment ended in, or `None` while the result is
/// still pending.
///
/// # Errors
///
/// [`FactoryError::Unauthorized`] unless the factory is calling itself.
pub fn resolve_deployment<S: Storage + ?Sized>(
    storage: &mut S,
    ctx: &CallContext,
    name: &str,
) -> Result<Option<DeploymentStatus>> {
    if !ctx.is_self_call() {
        return Err(FactoryError::Unauthorized);
    }
    let account_id = event_account(&ctx.current_account_id, name)?;

    let outcome = match ctx.promise_results.first() {
        Some(PromiseResult::Successful(_)) => DeploymentStatus::Confirmed,
        Some(PromiseResult::Failed) => DeploymentStatus::Failed,
        Some(PromiseResult::Pending) | None => {
            tracing::info!("Event creation for [ {account_id} ] is pending");
            return Ok(None);
        },
    };

    let key = name.to_string();
    if let Some(mut deployment) = DEPLOYMENTS.get(storage, &key)? {
        deployment.transition(outcome)?;
        deployment.resolved_at = Some(ctx.block_timestamp);
        DEPLOYMENTS.insert(storage, &key, &deployment)?;
    }

    if outcome == DeploymentStatus::Confirmed {
        tracing::info!("Event creation for [ {account_id} ] succeeded");
        REGISTRY.insert(storage, &key)?;
    } else {
        tracing::error!("Event creation for [ {account_id} ] failed");
    }

    Ok(Some(outcome))
}

/// Registered event names
///
/// # Errors
///
/// [`FactoryError::Storage`] on corrupt entries.
pub fn get_event_names<S: Storage + ?Sized>(storage: &S) -> Result<Vec<String>> {
    Ok(REGISTRY.values(storage)?)
}

/// Latest deployment record for `name`
///
/// # Errors
///
/// [`FactoryError::Storage`] on a corrupt record.
pub fn get_deployment<S: Storage + ?Sized>(storage: &S, name: &str) -> Result<Option<Deployment>> {
    Ok(DEPLOYMENTS.get(storage, &name.to_string())?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use gala_chain::constants::MIN_ACCOUNT_BALANCE;
    use gala_chain::{Timestamp, Trie};
    use proptest::prelude::*;

    fn factory() -> AccountId {
        AccountId::new("factory.testnet").unwrap()
    }

    fn request(caller: &str, deposit: Balance) -> CallContext {
        CallContext::new(factory(), AccountId::new(caller).unwrap(), Timestamp::from_nanos(1))
            .with_deposit(deposit)
    }

    fn callback(result: PromiseResult) -> CallContext {
        CallContext::new(factory(), factory(), Timestamp::from_nanos(2))
            .with_promise_results(vec![result])
    }

    fn deploying(trie: &mut Trie, name: &str) {
        let ctx = request("alice.testnet", MIN_ACCOUNT_BALANCE);
        let deployment = request_deployment(trie, &ctx, name, MIN_ACCOUNT_BALANCE).unwrap();
        start_deployment(trie, deployment).unwrap();
    }

    #[test]
    fn names_must_be_one_valid_segment() {
        for name in ["_", "", "a.b", "Party", "-party", "party-"] {
            assert_eq!(
                event_account(&factory(), name),
                Err(FactoryError::InvalidName {
                    name: name.to_string()
                }),
                "{name}"
            );
        }
        assert_eq!(
            event_account(&factory(), "space_party").unwrap().as_str(),
            "space_party.factory.testnet"
        );
    }

    #[test]
    fn request_checks_deposit_after_name() {
        let mut trie = Trie::new();
        let ctx = request("alice.testnet", Balance::from_near(1));

        assert!(matches!(
            request_deployment(&mut trie, &ctx, "_", MIN_ACCOUNT_BALANCE),
            Err(FactoryError::InvalidName { .. })
        ));
        assert!(matches!(
            request_deployment(&mut trie, &ctx, "party", MIN_ACCOUNT_BALANCE),
            Err(FactoryError::InsufficientDeposit { .. })
        ));
        assert!(trie.is_empty());
    }

    #[test]
    fn in_flight_name_is_taken() {
        let mut trie = Trie::new();
        deploying(&mut trie, "party");

        let ctx = request("bob.testnet", MIN_ACCOUNT_BALANCE);
        assert_eq!(
            request_deployment(&mut trie, &ctx, "party", MIN_ACCOUNT_BALANCE),
            Err(FactoryError::NameTaken {
                name: "party".to_string()
            })
        );
    }

    #[test]
    fn success_registers_name() {
        let mut trie = Trie::new();
        deploying(&mut trie, "party");

        let status =
            resolve_deployment(&mut trie, &callback(PromiseResult::Successful(vec![])), "party").unwrap();

        assert_eq!(status, Some(DeploymentStatus::Confirmed));
        assert_eq!(get_event_names(&trie).unwrap(), vec!["party".to_string()]);
        let deployment = get_deployment(&trie, "party").unwrap().unwrap();
        assert_eq!(deployment.status, DeploymentStatus::Confirmed);
        assert_eq!(deployment.requested_at, Timestamp::from_nanos(1));
        assert_eq!(deployment.resolved_at, Some(Timestamp::from_nanos(2)));

        let ctx = request("bob.testnet", MIN_ACCOUNT_BALANCE);
        assert!(matches!(
            request_deployment(&mut trie, &ctx, "party", MIN_ACCOUNT_BALANCE),
            Err(FactoryError::NameTaken { .. })
        ));
    }

    #[test]
    fn failure_leaves_registry_alone_and_frees_name() {
        let mut trie = Trie::new();
        deploying(&mut trie, "party");

        let status = resolve_deployment(&mut trie, &callback(PromiseResult::Failed), "party").unwrap();

        assert_eq!(status, Some(DeploymentStatus::Failed));
        assert!(get_event_names(&trie).unwrap().is_empty());
        assert_eq!(
            get_deployment(&trie, "party").unwrap().unwrap().resolved_at,
            Some(Timestamp::from_nanos(2))
        );

        let ctx = request("bob.testnet", MIN_ACCOUNT_BALANCE);
        let retry = request_deployment(&mut trie, &ctx, "party", MIN_ACCOUNT_BALANCE).unwrap();
        assert_eq!(retry.status, DeploymentStatus::Requested);
    }

    #[test]
    fn pending_result_changes_nothing() {
        let mut trie = Trie::new();
        deploying(&mut trie, "party");
        let before = trie.clone();

        let status = resolve_deployment(&mut trie, &callback(PromiseResult::Pending), "party").unwrap();

        assert_eq!(status, None);
        assert_eq!(trie, before);
    }

    #[test]
    fn callback_is_self_only() {
        let mut trie = Trie::new();
        deploying(&mut trie, "party");

        let forged = CallContext::new(factory(), AccountId::new("mallory.testnet").unwrap(), Timestamp::from_nanos(2))
            .with_promise_results(vec![PromiseResult::Successful(vec![])]);

        assert_eq!(
            resolve_deployment(&mut trie, &forged, "party"),
            Err(FactoryError::Unauthorized)
        );
        assert!(get_event_names(&trie).unwrap().is_empty());
    }

    proptest! {
        #[test]
        fn dotted_names_never_accepted(left in "[a-z]{1,8}", right in "[a-z]{1,8}") {
            let name = format!("{left}.{right}");
            let rejected = matches!(
                event_account(&factory(), &name),
                Err(FactoryError::InvalidName { .. })
            );
            prop_assert!(rejected);
        }
    }
}
