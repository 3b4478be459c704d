//! Platform constants.

use crate::types::{Balance, Gas, YOCTO_PER_NEAR};

/// One NEAR in yocto units
pub const ONE_NEAR: Balance = Balance::from_yocto(YOCTO_PER_NEAR);

/// Deposit required to fund the storage of a freshly deployed event account
pub const MIN_ACCOUNT_BALANCE: Balance = Balance::from_near(3);

/// One teragas
pub const ONE_TGAS: Gas = Gas::from_tgas(1);

/// Gas forwarded to every cross-contract call
pub const XCC_GAS: Gas = Gas::from_tgas(20);
