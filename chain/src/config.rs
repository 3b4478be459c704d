//! Platform limits with environment overrides.

use crate::constants::{MIN_ACCOUNT_BALANCE, XCC_GAS};
use crate::types::{Balance, Gas};
use serde::{Deserialize, Serialize};
use std::env;

/// Limits the contracts enforce and forward
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainConfig {
    /// Deposit required by `initialize` and `create_event`
    pub min_account_balance: Balance,
    /// Gas attached to cross-contract calls and callbacks
    pub xcc_gas: Gas,
}

impl ChainConfig {
    /// Load configuration from environment variables
    ///
    /// - `GALA_MIN_ACCOUNT_BALANCE`: yocto amount, defaults to 3 NEAR
    /// - `GALA_XCC_GAS`: gas units, defaults to 20 Tgas
    ///
    /// Unparseable values fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let min_account_balance = env::var("GALA_MIN_ACCOUNT_BALANCE")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(MIN_ACCOUNT_BALANCE);

        let xcc_gas = env::var("GALA_XCC_GAS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .map_or(XCC_GAS, Gas::new);

        Self {
            min_account_balance,
            xcc_gas,
        }
    }

    /// Override the minimum account balance
    #[must_use]
    pub const fn with_min_account_balance(mut self, balance: Balance) -> Self {
        self.min_account_balance = balance;
        self
    }

    /// Override the cross-contract gas
    #[must_use]
    pub const fn with_xcc_gas(mut self, gas: Gas) -> Self {
        self.xcc_gas = gas;
        self
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            min_account_balance: MIN_ACCOUNT_BALANCE,
            xcc_gas: XCC_GAS,
        }
    }
}
