//! In-memory chain for end-to-end tests.
//!
//! The [`Sandbox`] keeps accounts with balances, full-access keys, and
//! deployed contracts. Contracts deployed on it receive a host handle that
//! executes promise batches against the same accounts, so a factory can
//! create and initialize event accounts exactly as it would on chain.
//!
//! Receipts issued by contracts can be held back with
//! [`Sandbox::pause_receipts`] to observe a workflow mid-flight.

use crate::mocks::{ManualClock, test_epoch};
use chrono::{DateTime, Utc};
use gala_chain::{
    AccountId, AccountIdError, Action, Balance, BoxFuture, CallContext, ChainConfig, Contract,
    ContractCode, ContractError, Deployment, Host, PromiseBatch, PromiseResult, PublicKey,
    Timestamp,
};
use gala_core::environment::Clock;
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::watch;
use tokio::task::JoinHandle;

/// Sandbox failures
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SandboxError {
    /// Malformed account identifier
    #[error("invalid account id: {0}")]
    InvalidAccountId(#[from] AccountIdError),

    /// Account already exists
    #[error("account {0} already exists")]
    AccountExists(AccountId),

    /// Account does not exist
    #[error("account {0} does not exist")]
    AccountNotFound(AccountId),

    /// No contract deployed on the account
    #[error("no contract deployed on {0}")]
    NoContract(AccountId),

    /// Not enough funds to move
    #[error("{account} has {available} but needs {needed}")]
    InsufficientBalance {
        /// Account being debited
        account: AccountId,
        /// Amount requested
        needed: Balance,
        /// Amount held
        available: Balance,
    },

    /// Only direct sub-accounts of the predecessor can be created
    #[error("{predecessor} cannot create {account}")]
    CannotCreateAccount {
        /// Account issuing the batch
        predecessor: AccountId,
        /// Account to create
        account: AccountId,
    },

    /// Action on an account the predecessor does not control
    #[error("{predecessor} cannot {action} on {account}")]
    ActorNoPermission {
        /// Account issuing the batch
        predecessor: AccountId,
        /// Target account
        account: AccountId,
        /// Action name
        action: &'static str,
    },

    /// The contract rejected the call
    #[error(transparent)]
    Contract(#[from] ContractError),

    /// Arguments or return values did not (de)serialize
    #[error("serialization failed: {0}")]
    Serialization(String),
}

impl SandboxError {
    /// The contract's abort message, if the call aborted
    #[must_use]
    pub fn execution_message(&self) -> Option<&str> {
        match self {
            Self::Contract(ContractError::Execution(message)) => Some(message),
            _ => None,
        }
    }
}

/// Result type for sandbox operations
pub type Result<T> = std::result::Result<T, SandboxError>;

/// Return value of a top-level call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionResult {
    return_value: Vec<u8>,
}

impl ExecutionResult {
    /// Decode the JSON return value
    ///
    /// # Errors
    ///
    /// Returns [`SandboxError::Serialization`] if the value is not a `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.return_value)
            .map_err(|e| SandboxError::Serialization(e.to_string()))
    }

    /// The raw return bytes
    #[must_use]
    pub fn raw(&self) -> &[u8] {
        &self.return_value
    }
}

struct AccountRecord {
    balance: Balance,
    keys: BTreeSet<PublicKey>,
    code: Option<String>,
    contract: Option<Arc<dyn Contract>>,
}

impl AccountRecord {
    const fn new(balance: Balance) -> Self {
        Self {
            balance,
            keys: BTreeSet::new(),
            code: None,
            contract: None,
        }
    }
}

struct Chain {
    accounts: Mutex<BTreeMap<AccountId, AccountRecord>>,
    clock: Arc<ManualClock>,
    config: ChainConfig,
    receipts: watch::Sender<bool>,
    pending: Mutex<Vec<JoinHandle<()>>>,
}

impl Chain {
    fn accounts(&self) -> MutexGuard<'_, BTreeMap<AccountId, AccountRecord>> {
        self.accounts.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn block_timestamp(&self) -> Timestamp {
        Timestamp::from_datetime(self.clock.now())
    }

    fn host(self: &Arc<Self>) -> SandboxHost {
        SandboxHost {
            chain: Arc::downgrade(self),
            clock: Arc::clone(&self.clock),
        }
    }

    fn contract(&self, account: &AccountId) -> Result<Arc<dyn Contract>> {
        let accounts = self.accounts();
        let record = accounts
            .get(account)
            .ok_or_else(|| SandboxError::AccountNotFound(account.clone()))?;
        record
            .contract
            .clone()
            .ok_or_else(|| SandboxError::NoContract(account.clone()))
    }

    fn signer_key(&self, account: &AccountId) -> PublicKey {
        self.accounts()
            .get(account)
            .and_then(|record| record.keys.iter().next().cloned())
            .unwrap_or_else(|| PublicKey::new(format!("ed25519:{account}")))
    }

    fn move_funds(&self, from: &AccountId, to: &AccountId, amount: Balance) -> Result<()> {
        if amount.is_zero() {
            return Ok(());
        }

        let mut accounts = self.accounts();
        if !accounts.contains_key(to) {
            return Err(SandboxError::AccountNotFound(to.clone()));
        }

        let source = accounts
            .get_mut(from)
            .ok_or_else(|| SandboxError::AccountNotFound(from.clone()))?;
        let available = source.balance;
        source.balance =
            available
                .checked_sub(amount)
                .ok_or_else(|| SandboxError::InsufficientBalance {
                    account: from.clone(),
                    needed: amount,
                    available,
                })?;

        if let Some(target) = accounts.get_mut(to) {
            target.balance = target.balance.checked_add(amount).unwrap_or(target.balance);
        }
        Ok(())
    }

    fn deploy(self: &Arc<Self>, account: &AccountId, code: &Arc<dyn ContractCode>) -> Result<()> {
        let deployment = Deployment {
            account_id: account.clone(),
            host: Arc::new(self.host()),
            config: self.config,
        };
        let contract = code.instantiate(deployment);

        let mut accounts = self.accounts();
        let record = accounts
            .get_mut(account)
            .ok_or_else(|| SandboxError::AccountNotFound(account.clone()))?;
        record.code = Some(code.name().to_string());
        record.contract = Some(contract);

        tracing::debug!(account = %account, code = code.name(), "Contract deployed");
        Ok(())
    }

    /// Run one contract method with the deposit moved in first and refunded on failure
    async fn invoke(
        &self,
        predecessor: &AccountId,
        signer: &AccountId,
        receiver: &AccountId,
        method: &str,
        args: &[u8],
        deposit: Balance,
    ) -> Result<(Vec<u8>, Option<BoxFuture<'static, ()>>)> {
        let contract = self.contract(receiver)?;
        let signer_key = self.signer_key(signer);
        self.move_funds(predecessor, receiver, deposit)?;

        let context = CallContext::new(receiver.clone(), predecessor.clone(), self.block_timestamp())
            .with_signer(signer.clone())
            .with_signer_pk(signer_key)
            .with_deposit(deposit)
            .with_prepaid_gas(self.config.xcc_gas);

        match contract.call(context, method, args).await {
            Ok(outcome) => Ok((outcome.return_value, outcome.settled)),
            Err(error) => {
                if let Err(refund) = self.move_funds(receiver, predecessor, deposit) {
                    tracing::error!(error = %refund, "Deposit refund failed");
                }
                Err(error.into())
            },
        }
    }

    async fn run_batch(
        self: Arc<Self>,
        predecessor: AccountId,
        signer: AccountId,
        batch: PromiseBatch,
    ) -> PromiseResult {
        let mut gate = self.receipts.subscribe();
        if gate.wait_for(|flowing| *flowing).await.is_err() {
            return PromiseResult::Failed;
        }

        let receiver = batch.receiver_id;
        let mut created = false;
        let mut last_value = Vec::new();

        for action in batch.actions {
            let name = action.name();
            match self.apply(&predecessor, &signer, &receiver, action, &mut created).await {
                Ok(value) => last_value = value,
                Err(error) => {
                    tracing::warn!(
                        predecessor = %predecessor,
                        receiver = %receiver,
                        action = name,
                        error = %error,
                        "Receipt failed"
                    );
                    return PromiseResult::Failed;
                },
            }
        }

        PromiseResult::Successful(last_value)
    }

    async fn apply(
        self: &Arc<Self>,
        predecessor: &AccountId,
        signer: &AccountId,
        receiver: &AccountId,
        action: Action,
        created: &mut bool,
    ) -> Result<Vec<u8>> {
        let name = action.name();
        let controls_receiver = *created || predecessor == receiver;

        match action {
            Action::CreateAccount => {
                if !receiver.is_direct_sub_account_of(predecessor) {
                    return Err(SandboxError::CannotCreateAccount {
                        predecessor: predecessor.clone(),
                        account: receiver.clone(),
                    });
                }
                let mut accounts = self.accounts();
                if accounts.contains_key(receiver) {
                    return Err(SandboxError::AccountExists(receiver.clone()));
                }
                accounts.insert(receiver.clone(), AccountRecord::new(Balance::ZERO));
                *created = true;
                Ok(Vec::new())
            },
            Action::DeployContract { code } => {
                Self::require_control(controls_receiver, predecessor, receiver, name)?;
                self.deploy(receiver, &code)?;
                Ok(Vec::new())
            },
            Action::AddFullAccessKey { public_key } => {
                Self::require_control(controls_receiver, predecessor, receiver, name)?;
                let mut accounts = self.accounts();
                let record = accounts
                    .get_mut(receiver)
                    .ok_or_else(|| SandboxError::AccountNotFound(receiver.clone()))?;
                record.keys.insert(public_key);
                Ok(Vec::new())
            },
            Action::FunctionCall {
                method_name,
                args,
                deposit,
                ..
            } => {
                let (value, settled) = self
                    .invoke(predecessor, signer, receiver, &method_name, &args, deposit)
                    .await?;
                if let Some(settled) = settled {
                    settled.await;
                }
                Ok(value)
            },
            Action::Transfer { deposit } => {
                self.move_funds(predecessor, receiver, deposit)?;
                Ok(Vec::new())
            },
        }
    }

    fn require_control(
        controls_receiver: bool,
        predecessor: &AccountId,
        receiver: &AccountId,
        action: &'static str,
    ) -> Result<()> {
        if controls_receiver {
            Ok(())
        } else {
            Err(SandboxError::ActorNoPermission {
                predecessor: predecessor.clone(),
                account: receiver.clone(),
                action,
            })
        }
    }
}

/// Host handle given to contracts deployed on the sandbox
struct SandboxHost {
    chain: Weak<Chain>,
    clock: Arc<ManualClock>,
}

impl Host for SandboxHost {
    fn execute(
        &self,
        predecessor: AccountId,
        signer: AccountId,
        batch: PromiseBatch,
    ) -> BoxFuture<'_, PromiseResult> {
        let chain = self.chain.upgrade();
        Box::pin(async move {
            match chain {
                Some(chain) => chain.run_batch(predecessor, signer, batch).await,
                None => PromiseResult::Failed,
            }
        })
    }

    fn block_timestamp(&self) -> Timestamp {
        Timestamp::from_datetime(self.clock.now())
    }
}

/// In-memory chain
#[derive(Clone)]
pub struct Sandbox {
    chain: Arc<Chain>,
}

impl Sandbox {
    /// Sandbox with default limits and the clock at the test epoch
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(ChainConfig::default())
    }

    /// Sandbox with custom limits and the clock at the test epoch
    #[must_use]
    pub fn with_config(config: ChainConfig) -> Self {
        Self::starting_at(config, test_epoch())
    }

    /// Sandbox with custom limits whose block time starts at `genesis`
    #[must_use]
    pub fn starting_at(config: ChainConfig, genesis: DateTime<Utc>) -> Self {
        let (receipts, _) = watch::channel(true);
        Self {
            chain: Arc::new(Chain {
                accounts: Mutex::new(BTreeMap::new()),
                clock: Arc::new(ManualClock::new(genesis)),
                config,
                receipts,
                pending: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Platform limits in force
    #[must_use]
    pub fn config(&self) -> ChainConfig {
        self.chain.config
    }

    /// Create a funded account with a full-access key `ed25519:<id>`
    ///
    /// # Errors
    ///
    /// Fails for an invalid or existing account id.
    pub fn create_account(&self, id: &str, balance: Balance) -> Result<AccountId> {
        let account = AccountId::new(id)?;
        let mut accounts = self.chain.accounts();
        if accounts.contains_key(&account) {
            return Err(SandboxError::AccountExists(account));
        }

        let mut record = AccountRecord::new(balance);
        record.keys.insert(PublicKey::new(format!("ed25519:{account}")));
        accounts.insert(account.clone(), record);
        Ok(account)
    }

    /// Deploy `code` to an existing account
    ///
    /// # Errors
    ///
    /// Fails if the account does not exist.
    pub fn deploy(&self, account: &AccountId, code: Arc<dyn ContractCode>) -> Result<()> {
        self.chain.deploy(account, &code)
    }

    /// Call a change method signed by `signer`
    ///
    /// Returns once the method itself has run. Work the method started
    /// (transfers, deployments, callbacks) continues in the background until
    /// [`Sandbox::settle`].
    ///
    /// # Errors
    ///
    /// Fails if the signer cannot cover `deposit`, the receiver has no
    /// contract, or the method aborts. The deposit is refunded on abort.
    pub async fn call<T: Serialize + ?Sized>(
        &self,
        signer: &AccountId,
        receiver: &AccountId,
        method: &str,
        args: &T,
        deposit: Balance,
    ) -> Result<ExecutionResult> {
        let args = serde_json::to_vec(args).map_err(|e| SandboxError::Serialization(e.to_string()))?;
        let (return_value, settled) = self
            .chain
            .invoke(signer, signer, receiver, method, &args, deposit)
            .await?;

        if let Some(settled) = settled {
            self.chain
                .pending
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(tokio::spawn(settled));
        }

        Ok(ExecutionResult { return_value })
    }

    /// [`Sandbox::call`] followed by [`Sandbox::settle`]
    ///
    /// # Errors
    ///
    /// Same as [`Sandbox::call`].
    pub async fn transact<T: Serialize + ?Sized>(
        &self,
        signer: &AccountId,
        receiver: &AccountId,
        method: &str,
        args: &T,
        deposit: Balance,
    ) -> Result<ExecutionResult> {
        let result = self.call(signer, receiver, method, args, deposit).await?;
        self.settle().await;
        Ok(result)
    }

    /// Call a read-only method as `caller` and decode the result
    ///
    /// # Errors
    ///
    /// Fails if the contract is missing, the method aborts, or the value does
    /// not decode as `R`.
    pub async fn view<T, R>(
        &self,
        caller: &AccountId,
        contract: &AccountId,
        method: &str,
        args: &T,
    ) -> Result<R>
    where
        T: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let args = serde_json::to_vec(args).map_err(|e| SandboxError::Serialization(e.to_string()))?;
        let instance = self.chain.contract(contract)?;
        let context = CallContext::new(contract.clone(), caller.clone(), self.chain.block_timestamp())
            .with_signer_pk(self.chain.signer_key(caller));

        let bytes = instance.view(context, method, &args).await?;
        serde_json::from_slice(&bytes).map_err(|e| SandboxError::Serialization(e.to_string()))
    }

    /// Balance of `account`
    ///
    /// # Errors
    ///
    /// Fails if the account does not exist.
    pub fn balance(&self, account: &AccountId) -> Result<Balance> {
        self.chain
            .accounts()
            .get(account)
            .map(|record| record.balance)
            .ok_or_else(|| SandboxError::AccountNotFound(account.clone()))
    }

    /// True when `account` exists
    #[must_use]
    pub fn account_exists(&self, account: &AccountId) -> bool {
        self.chain.accounts().contains_key(account)
    }

    /// True when `account` holds `key`
    #[must_use]
    pub fn has_key(&self, account: &AccountId, key: &PublicKey) -> bool {
        self.chain
            .accounts()
            .get(account)
            .is_some_and(|record| record.keys.contains(key))
    }

    /// Name of the code deployed on `account`
    #[must_use]
    pub fn code_name(&self, account: &AccountId) -> Option<String> {
        self.chain
            .accounts()
            .get(account)
            .and_then(|record| record.code.clone())
    }

    /// Current block time
    #[must_use]
    pub fn block_timestamp(&self) -> Timestamp {
        self.chain.block_timestamp()
    }

    /// Move block time forward
    pub fn advance(&self, duration: Duration) {
        self.chain.clock.advance(duration);
    }

    /// Hold every receipt issued by contracts until [`Sandbox::resume_receipts`]
    pub fn pause_receipts(&self) {
        self.chain.receipts.send_replace(false);
    }

    /// Release held receipts
    pub fn resume_receipts(&self) {
        self.chain.receipts.send_replace(true);
    }

    /// Wait for all background work started by earlier calls
    ///
    /// Never returns while receipts are paused and work is outstanding.
    pub async fn settle(&self) {
        loop {
            let pending = std::mem::take(
                &mut *self
                    .chain
                    .pending
                    .lock()
                    .unwrap_or_else(PoisonError::into_inner),
            );
            if pending.is_empty() {
                break;
            }
            for handle in pending {
                if let Err(error) = handle.await {
                    tracing::error!(error = %error, "Background receipt task failed");
                }
            }
        }
    }

    /// Shut down every deployed contract, giving each `timeout` to drain
    ///
    /// Change calls fail afterwards; views keep answering.
    ///
    /// # Errors
    ///
    /// Returns the first contract that could not drain in time. The others
    /// are still shut down.
    pub async fn shutdown(&self, timeout: Duration) -> Result<()> {
        let contracts: Vec<(AccountId, Arc<dyn Contract>)> = self
            .chain
            .accounts()
            .iter()
            .filter_map(|(id, record)| record.contract.clone().map(|contract| (id.clone(), contract)))
            .collect();

        let mut first_error = None;
        for (account, contract) in contracts {
            if let Err(error) = contract.shutdown(timeout).await {
                tracing::error!(%account, %error, "Contract did not drain");
                first_error.get_or_insert(error);
            }
        }

        tracing::info!("Sandbox shut down");
        first_error.map_or(Ok(()), |error| Err(error.into()))
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sandbox")
            .field("accounts", &self.chain.accounts().len())
            .field("config", &self.chain.config)
            .finish_non_exhaustive()
    }
}
