//! Address cache and identity store
//!
//! Both stores are keyed by [`NodeId`] and must tolerate concurrent readers
//! and writers; the resolver adds no locking of its own. A miss is reported
//! as [`StoreError::UnknownIdentity`], which is the only error that sends
//! the resolver to the anchors.

use dashmap::DashMap;
use std::borrow::Cow;
use thiserror::Error;
use wayfind_core::{NodeId, NodeRecord, RpcError};

/// Store errors
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// No entry for the identity
    #[error("Unknown identity: {0}")]
    UnknownIdentity(NodeId),

    /// Backend failure
    #[error("Store backend error: {0}")]
    Backend(Cow<'static, str>),
}

impl From<StoreError> for RpcError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::UnknownIdentity(id) => RpcError::UnknownIdentity(id),
            StoreError::Backend(reason) => RpcError::Store(reason),
        }
    }
}

/// Identity to last-known address mapping
pub trait AddressCache: Send + Sync {
    /// Look up the address of `id`
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownIdentity`] on a miss, [`StoreError::Backend`]
    /// if the cache cannot be read.
    fn get(&self, id: &NodeId) -> Result<String, StoreError>;

    /// Record the address of `id`, replacing any previous one
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if the cache cannot be written.
    fn set(&self, id: &NodeId, addr: &str) -> Result<(), StoreError>;
}

/// Identity to identity record mapping
pub trait IdentityStore: Send + Sync {
    /// Look up the record of `id`
    ///
    /// # Errors
    ///
    /// [`StoreError::UnknownIdentity`] on a miss, [`StoreError::Backend`]
    /// if the store cannot be read.
    fn get(&self, id: &NodeId) -> Result<NodeRecord, StoreError>;

    /// Store `record` under its own identity, replacing any previous one
    ///
    /// # Errors
    ///
    /// [`StoreError::Backend`] if the store cannot be written.
    fn set(&self, record: &NodeRecord) -> Result<(), StoreError>;
}

/// In-memory address cache
#[derive(Debug, Default)]
pub struct MemoryAddressCache {
    entries: DashMap<NodeId, String>,
}

impl MemoryAddressCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of cached addresses
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the cache is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop the entry for `id`, returning the address it held
    pub fn remove(&self, id: &NodeId) -> Option<String> {
        self.entries.remove(id).map(|(_, addr)| addr)
    }
}

impl AddressCache for MemoryAddressCache {
    fn get(&self, id: &NodeId) -> Result<String, StoreError> {
        self.entries
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::UnknownIdentity(*id))
    }

    fn set(&self, id: &NodeId, addr: &str) -> Result<(), StoreError> {
        self.entries.insert(*id, addr.to_owned());
        Ok(())
    }
}

/// In-memory identity store
#[derive(Debug, Default)]
pub struct MemoryIdentityStore {
    records: DashMap<NodeId, NodeRecord>,
}

impl MemoryIdentityStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the store is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Drop the record for `id`, returning it
    pub fn remove(&self, id: &NodeId) -> Option<NodeRecord> {
        self.records.remove(id).map(|(_, record)| record)
    }

    /// Store `record` under an arbitrary key
    ///
    /// Lets callers seed entries whose key and record identity differ, such
    /// as stale records imported from elsewhere.
    pub fn insert_under(&self, id: NodeId, record: NodeRecord) {
        self.records.insert(id, record);
    }
}

impl IdentityStore for MemoryIdentityStore {
    fn get(&self, id: &NodeId) -> Result<NodeRecord, StoreError> {
        self.records
            .get(id)
            .map(|entry| entry.value().clone())
            .ok_or(StoreError::UnknownIdentity(*id))
    }

    fn set(&self, record: &NodeRecord) -> Result<(), StoreError> {
        self.records.insert(record.id, record.clone());
        Ok(())
    }
}
