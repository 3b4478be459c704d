//! Identity, amount, and time types shared by every contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

// ============================================================================
// AccountId
// ============================================================================

/// Minimum length of an account identifier
pub const MIN_ACCOUNT_ID_LEN: usize = 2;

/// Maximum length of an account identifier
pub const MAX_ACCOUNT_ID_LEN: usize = 64;

/// Reasons an account identifier is rejected
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AccountIdError {
    /// Shorter than [`MIN_ACCOUNT_ID_LEN`]
    #[error("account id is too short ({len} < {MIN_ACCOUNT_ID_LEN})")]
    TooShort {
        /// Actual length
        len: usize,
    },

    /// Longer than [`MAX_ACCOUNT_ID_LEN`]
    #[error("account id is too long ({len} > {MAX_ACCOUNT_ID_LEN})")]
    TooLong {
        /// Actual length
        len: usize,
    },

    /// Character outside `a-z`, `0-9`, `-`, `_`, `.`
    #[error("invalid character {character:?} at index {index}")]
    InvalidChar {
        /// Offending character
        character: char,
        /// Byte index
        index: usize,
    },

    /// Separator at the start or end, or two separators in a row
    #[error("redundant separator at index {index}")]
    RedundantSeparator {
        /// Byte index
        index: usize,
    },
}

/// A validated account identifier (`alice.testnet`, `spaceparty.factory.testnet`)
///
/// Dot-separated segments of lowercase alphanumerics, optionally joined by a
/// single `-` or `_`; 2 to 64 characters overall.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct AccountId(String);

impl AccountId {
    /// Validate and wrap an account identifier
    ///
    /// # Errors
    ///
    /// Returns [`AccountIdError`] when the identifier breaks the naming rules.
    pub fn new(id: impl Into<String>) -> Result<Self, AccountIdError> {
        let id = id.into();
        Self::validate(&id)?;
        Ok(Self(id))
    }

    /// Check an identifier without allocating
    ///
    /// # Errors
    ///
    /// Returns [`AccountIdError`] when the identifier breaks the naming rules.
    pub fn validate(id: &str) -> Result<(), AccountIdError> {
        if id.len() < MIN_ACCOUNT_ID_LEN {
            return Err(AccountIdError::TooShort { len: id.len() });
        }
        if id.len() > MAX_ACCOUNT_ID_LEN {
            return Err(AccountIdError::TooLong { len: id.len() });
        }

        // Start of string behaves like a separator so a leading one is rejected
        let mut last_was_separator = true;
        for (index, character) in id.char_indices() {
            match character {
                'a'..='z' | '0'..='9' => last_was_separator = false,
                '-' | '_' | '.' => {
                    if last_was_separator {
                        return Err(AccountIdError::RedundantSeparator { index });
                    }
                    last_was_separator = true;
                },
                _ => return Err(AccountIdError::InvalidChar { character, index }),
            }
        }

        if last_was_separator {
            return Err(AccountIdError::RedundantSeparator { index: id.len() - 1 });
        }

        Ok(())
    }

    /// Borrow the identifier
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Build `name.self`
    ///
    /// # Errors
    ///
    /// Returns [`AccountIdError`] when the combined identifier is invalid.
    pub fn sub_account(&self, name: &str) -> Result<Self, AccountIdError> {
        Self::new(format!("{name}.{}", self.0))
    }

    /// True when `self` is exactly one level below `parent`
    #[must_use]
    pub fn is_direct_sub_account_of(&self, parent: &Self) -> bool {
        self.0
            .strip_suffix(parent.as_str())
            .and_then(|rest| rest.strip_suffix('.'))
            .is_some_and(|prefix| !prefix.is_empty() && !prefix.contains('.'))
    }
}

impl TryFrom<String> for AccountId {
    type Error = AccountIdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl TryFrom<&str> for AccountId {
    type Error = AccountIdError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl FromStr for AccountId {
    type Err = AccountIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl From<AccountId> for String {
    fn from(value: AccountId) -> Self {
        value.0
    }
}

impl AsRef<str> for AccountId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Balance
// ============================================================================

/// Yocto units in one NEAR
pub const YOCTO_PER_NEAR: u128 = 1_000_000_000_000_000_000_000_000;

/// An amount of the native currency in yocto units
///
/// Serialized as a decimal string so 128-bit values survive JSON clients.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Balance(u128);

impl Balance {
    /// Zero
    pub const ZERO: Self = Self(0);

    /// Wrap a yocto amount
    #[must_use]
    pub const fn from_yocto(yocto: u128) -> Self {
        Self(yocto)
    }

    /// Whole NEAR, saturating on overflow
    #[must_use]
    pub const fn from_near(near: u128) -> Self {
        Self(near.saturating_mul(YOCTO_PER_NEAR))
    }

    /// The yocto amount
    #[must_use]
    pub const fn as_yocto(self) -> u128 {
        self.0
    }

    /// True for zero
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition
    #[must_use]
    pub const fn checked_add(self, other: Self) -> Option<Self> {
        match self.0.checked_add(other.0) {
            Some(sum) => Some(Self(sum)),
            None => None,
        }
    }

    /// Checked subtraction
    #[must_use]
    pub const fn checked_sub(self, other: Self) -> Option<Self> {
        match self.0.checked_sub(other.0) {
            Some(diff) => Some(Self(diff)),
            None => None,
        }
    }

    /// Addition clamped at the maximum
    #[must_use]
    pub const fn saturating_add(self, other: Self) -> Self {
        Self(self.0.saturating_add(other.0))
    }

    /// Floor share of `self` across `parts` recipients; zero when `parts` is zero
    #[must_use]
    pub const fn share(self, parts: u128) -> Self {
        match self.0.checked_div(parts) {
            Some(share) => Self(share),
            None => Self::ZERO,
        }
    }
}

impl fmt::Display for Balance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for Balance {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

impl Serialize for Balance {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0.to_string())
    }
}

impl<'de> Deserialize<'de> for Balance {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

// ============================================================================
// Gas
// ============================================================================

/// Gas units prepaid for a call
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Gas(u64);

impl Gas {
    /// Wrap raw gas units
    #[must_use]
    pub const fn new(units: u64) -> Self {
        Self(units)
    }

    /// Teragas (10^12 units)
    #[must_use]
    pub const fn from_tgas(tgas: u64) -> Self {
        Self(tgas.saturating_mul(1_000_000_000_000))
    }

    /// Raw gas units
    #[must_use]
    pub const fn as_units(self) -> u64 {
        self.0
    }
}

impl fmt::Display for Gas {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Timestamp
// ============================================================================

const NANOS_PER_SECOND: u64 = 1_000_000_000;

/// Block time in nanoseconds since the Unix epoch
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Wrap nanoseconds since the epoch
    #[must_use]
    pub const fn from_nanos(nanos: u64) -> Self {
        Self(nanos)
    }

    /// Nanoseconds since the epoch
    #[must_use]
    pub const fn as_nanos(self) -> u64 {
        self.0
    }

    /// Convert a wall-clock time; instants before the epoch clamp to zero
    #[must_use]
    pub fn from_datetime(time: DateTime<Utc>) -> Self {
        let nanos = time.timestamp_nanos_opt().unwrap_or(i64::MAX);
        Self(u64::try_from(nanos).unwrap_or(0))
    }

    /// Convert back to a wall-clock time
    #[must_use]
    pub fn to_datetime(self) -> DateTime<Utc> {
        #[allow(clippy::cast_possible_wrap)] // u64 seconds from i64 nanos fit in i64
        let secs = (self.0 / NANOS_PER_SECOND) as i64;
        #[allow(clippy::cast_possible_truncation)] // remainder < 10^9
        let nanos = (self.0 % NANOS_PER_SECOND) as u32;
        DateTime::from_timestamp(secs, nanos).unwrap_or_default()
    }

    /// Later timestamp, saturating at the maximum
    #[must_use]
    pub fn saturating_add(self, duration: Duration) -> Self {
        let delta = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_add(delta))
    }

    /// Earlier timestamp, saturating at the epoch
    #[must_use]
    pub fn saturating_sub(self, duration: Duration) -> Self {
        let delta = u64::try_from(duration.as_nanos()).unwrap_or(u64::MAX);
        Self(self.0.saturating_sub(delta))
    }
}

impl From<DateTime<Utc>> for Timestamp {
    fn from(time: DateTime<Utc>) -> Self {
        Self::from_datetime(time)
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// PublicKey
// ============================================================================

/// An access key in its textual form (`ed25519:<base58>`)
///
/// Opaque to the contracts: they only forward it to the host.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PublicKey(String);

impl PublicKey {
    /// Wrap a textual key
    #[must_use]
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Borrow the textual key
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
