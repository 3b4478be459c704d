//! Persistent key-value storage.
//!
//! Contracts persist two shapes of data:
//!
//! - singleton records under a fixed key ([`read_record`] / [`write_record`])
//! - collections under a short namespace prefix ([`PersistentSet`], [`PersistentMap`])
//!
//! Values and set elements are encoded with `bincode`. Collection entries
//! live at `<prefix>::<encoded key>`, so enumeration follows the byte order of
//! the encoded keys: stable while the collection is unchanged, but not
//! insertion order.

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::marker::PhantomData;
use thiserror::Error;

/// Storage encoding errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StorageError {
    /// A value could not be encoded
    #[error("failed to encode {key}: {message}")]
    Encode {
        /// Record key or collection prefix
        key: String,
        /// Encoder message
        message: String,
    },

    /// Stored bytes could not be decoded
    #[error("failed to decode {key}: {message}")]
    Decode {
        /// Record key or collection prefix
        key: String,
        /// Decoder message
        message: String,
    },
}

/// Result type for storage operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Raw byte storage owned by one contract account
pub trait Storage {
    /// Read the value stored under `key`
    fn read(&self, key: &[u8]) -> Option<&[u8]>;

    /// Store `value` under `key`, returning the previous value
    fn write(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>>;

    /// Remove `key`, returning the previous value
    fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>>;

    /// All keys starting with `prefix`, in byte order
    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>>;

    /// True when `key` is present
    fn has_key(&self, key: &[u8]) -> bool {
        self.read(key).is_some()
    }
}

/// In-memory ordered storage
///
/// Cheap to clone, which is how a call works on a draft and commits it only
/// on success.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trie {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl Trie {
    /// Empty storage
    #[must_use]
    pub const fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Number of stored keys
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when nothing is stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Storage for Trie {
    fn read(&self, key: &[u8]) -> Option<&[u8]> {
        self.entries.get(key).map(Vec::as_slice)
    }

    fn write(&mut self, key: Vec<u8>, value: Vec<u8>) -> Option<Vec<u8>> {
        self.entries.insert(key, value)
    }

    fn remove(&mut self, key: &[u8]) -> Option<Vec<u8>> {
        self.entries.remove(key)
    }

    fn keys_with_prefix(&self, prefix: &[u8]) -> Vec<Vec<u8>> {
        self.entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

fn encode<T: Serialize + ?Sized>(key: &str, value: &T) -> Result<Vec<u8>> {
    bincode::serialize(value).map_err(|e| StorageError::Encode {
        key: key.to_string(),
        message: e.to_string(),
    })
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Decode {
        key: key.to_string(),
        message: e.to_string(),
    })
}

/// Load the singleton record stored under `key`
///
/// # Errors
///
/// Returns [`StorageError::Decode`] if the stored bytes do not decode as `T`.
pub fn read_record<S, T>(storage: &S, key: &str) -> Result<Option<T>>
where
    S: Storage + ?Sized,
    T: DeserializeOwned,
{
    storage
        .read(key.as_bytes())
        .map(|bytes| decode(key, bytes))
        .transpose()
}

/// Persist the singleton record under `key`
///
/// # Errors
///
/// Returns [`StorageError::Encode`] if the value cannot be encoded.
pub fn write_record<S, T>(storage: &mut S, key: &str, value: &T) -> Result<()>
where
    S: Storage + ?Sized,
    T: Serialize,
{
    let bytes = encode(key, value)?;
    storage.write(key.as_bytes().to_vec(), bytes);
    Ok(())
}

fn namespace(prefix: &str) -> Vec<u8> {
    let mut key = prefix.as_bytes().to_vec();
    key.extend_from_slice(b"::");
    key
}

/// A set stored under a namespace prefix
///
/// The handle holds no data; every operation goes through the storage passed
/// in, so a call always sees what was last committed.
#[derive(Debug, Clone, Copy)]
pub struct PersistentSet<T> {
    prefix: &'static str,
    _element: PhantomData<fn() -> T>,
}

impl<T> PersistentSet<T> {
    /// Set handle for `prefix`
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            _element: PhantomData,
        }
    }

    /// The namespace prefix
    #[must_use]
    pub const fn prefix(&self) -> &'static str {
        self.prefix
    }
}

impl<T: Serialize + DeserializeOwned> PersistentSet<T> {
    fn element_key(&self, value: &T) -> Result<Vec<u8>> {
        let mut key = namespace(self.prefix);
        key.extend(encode(self.prefix, value)?);
        Ok(key)
    }

    /// Insert `value`; returns `false` if it was already present
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encode`] if the element cannot be encoded.
    pub fn insert<S: Storage + ?Sized>(&self, storage: &mut S, value: &T) -> Result<bool> {
        let key = self.element_key(value)?;
        Ok(storage.write(key, Vec::new()).is_none())
    }

    /// Remove `value`; returns `false` if it was absent
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encode`] if the element cannot be encoded.
    pub fn remove<S: Storage + ?Sized>(&self, storage: &mut S, value: &T) -> Result<bool> {
        let key = self.element_key(value)?;
        Ok(storage.remove(&key).is_some())
    }

    /// Membership test
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encode`] if the element cannot be encoded.
    pub fn contains<S: Storage + ?Sized>(&self, storage: &S, value: &T) -> Result<bool> {
        let key = self.element_key(value)?;
        Ok(storage.has_key(&key))
    }

    /// Number of elements
    pub fn len<S: Storage + ?Sized>(&self, storage: &S) -> usize {
        storage.keys_with_prefix(&namespace(self.prefix)).len()
    }

    /// True when the set is empty
    pub fn is_empty<S: Storage + ?Sized>(&self, storage: &S) -> bool {
        self.len(storage) == 0
    }

    /// All elements in enumeration order
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Decode`] if a stored element is corrupt.
    pub fn values<S: Storage + ?Sized>(&self, storage: &S) -> Result<Vec<T>> {
        let ns = namespace(self.prefix);
        storage
            .keys_with_prefix(&ns)
            .iter()
            .map(|key| decode(self.prefix, &key[ns.len()..]))
            .collect()
    }
}

/// A map stored under a namespace prefix
#[derive(Debug, Clone, Copy)]
pub struct PersistentMap<K, V> {
    prefix: &'static str,
    _entry: PhantomData<fn() -> (K, V)>,
}

impl<K, V> PersistentMap<K, V> {
    /// Map handle for `prefix`
    #[must_use]
    pub const fn new(prefix: &'static str) -> Self {
        Self {
            prefix,
            _entry: PhantomData,
        }
    }
}

impl<K, V> PersistentMap<K, V>
where
    K: Serialize + DeserializeOwned,
    V: Serialize + DeserializeOwned,
{
    fn entry_key(&self, key: &K) -> Result<Vec<u8>> {
        let mut raw = namespace(self.prefix);
        raw.extend(encode(self.prefix, key)?);
        Ok(raw)
    }

    /// Value stored for `key`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError`] if the key cannot be encoded or the value is corrupt.
    pub fn get<S: Storage + ?Sized>(&self, storage: &S, key: &K) -> Result<Option<V>> {
        let raw = self.entry_key(key)?;
        storage
            .read(&raw)
            .map(|bytes| decode(self.prefix, bytes))
            .transpose()
    }

    /// Store `value` for `key`
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encode`] if the key or value cannot be encoded.
    pub fn insert<S: Storage + ?Sized>(&self, storage: &mut S, key: &K, value: &V) -> Result<()> {
        let raw = self.entry_key(key)?;
        storage.write(raw, encode(self.prefix, value)?);
        Ok(())
    }

    /// Remove `key`; returns `false` if it was absent
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Encode`] if the key cannot be encoded.
    pub fn remove<S: Storage + ?Sized>(&self, storage: &mut S, key: &K) -> Result<bool> {
        let raw = self.entry_key(key)?;
        Ok(storage.remove(&raw).is_some())
    }

    /// All entries in enumeration order
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Decode`] if a stored entry is corrupt.
    pub fn entries<S: Storage + ?Sized>(&self, storage: &S) -> Result<Vec<(K, V)>> {
        let ns = namespace(self.prefix);
        storage
            .keys_with_prefix(&ns)
            .iter()
            .map(|raw| {
                let key = decode(self.prefix, &raw[ns.len()..])?;
                let value = storage
                    .read(raw)
                    .map(|bytes| decode(self.prefix, bytes))
                    .transpose()?
                    .ok_or_else(|| StorageError::Decode {
                        key: self.prefix.to_string(),
                        message: "entry vanished during enumeration".to_string(),
                    })?;
                Ok((key, value))
            })
            .collect()
    }
}
