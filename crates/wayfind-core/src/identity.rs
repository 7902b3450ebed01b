//! Node identities and identity records
//!
//! A [`NodeId`] is the opaque 256-bit identifier of a peer, derived from its
//! public key with BLAKE3. A [`NodeRecord`] is what resolution produces: the
//! identity together with its last-known address, key material and
//! capability flags.
//!
//! # Example
//!
//! ```
//! use wayfind_core::{NodeCapabilities, NodeRecord};
//!
//! let record = NodeRecord::new("10.0.0.5:4661", [7u8; 32], NodeCapabilities::default());
//! assert!(record.verify_identity().is_ok());
//! assert!(record.matches(&record.id));
//! ```

use crate::error::{Result, RpcError};
use blake3::Hasher;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Domain separation tag for identity derivation
const NODE_ID_DOMAIN: &[u8] = b"wayfind-node-id";

/// 256-bit peer identifier
///
/// Equality is value equality; the identifier keys address caches, identity
/// stores and connection pools alike. Renders as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId([u8; 32]);

impl NodeId {
    /// Length of a NodeId in bytes
    pub const LEN: usize = 32;

    /// Create NodeId from raw bytes
    ///
    /// # Examples
    ///
    /// ```
    /// use wayfind_core::NodeId;
    ///
    /// let id = NodeId::from_bytes([1u8; 32]);
    /// assert_eq!(id.as_bytes(), &[1u8; 32]);
    /// ```
    #[must_use]
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// Derive the NodeId owned by a public key
    ///
    /// Deterministic: the same key always yields the same identifier.
    ///
    /// # Examples
    ///
    /// ```
    /// use wayfind_core::NodeId;
    ///
    /// let a = NodeId::from_public_key(&[42u8; 32]);
    /// let b = NodeId::from_public_key(&[42u8; 32]);
    /// assert_eq!(a, b);
    /// ```
    #[must_use]
    pub fn from_public_key(public_key: &[u8; 32]) -> Self {
        let mut hasher = Hasher::new();
        hasher.update(public_key);
        hasher.update(NODE_ID_DOMAIN);
        Self(*hasher.finalize().as_bytes())
    }

    /// Get the raw bytes of the NodeId
    #[must_use]
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Shortened hex form (first 8 bytes) for log lines
    #[must_use]
    pub fn short(&self) -> String {
        hex::encode(&self.0[..8])
    }
}

impl fmt::Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "NodeId({})", self.short())
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl FromStr for NodeId {
    type Err = RpcError;

    fn from_str(s: &str) -> Result<Self> {
        let mut bytes = [0u8; 32];
        hex::decode_to_slice(s.trim(), &mut bytes)
            .map_err(|_| RpcError::invalid_config("node id must be 64 hex characters"))?;
        Ok(Self(bytes))
    }
}

impl Serialize for NodeId {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        if serializer.is_human_readable() {
            serializer.serialize_str(&self.to_string())
        } else {
            self.0.serialize(serializer)
        }
    }
}

impl<'de> Deserialize<'de> for NodeId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        if deserializer.is_human_readable() {
            let s = String::deserialize(deserializer)?;
            s.parse().map_err(serde::de::Error::custom)
        } else {
            <[u8; 32]>::deserialize(deserializer).map(Self)
        }
    }
}

/// Capability flags advertised in a node record
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeCapabilities {
    /// Serves `DHT.FindNode` lookups for other nodes
    pub anchor: bool,

    /// Can relay traffic for peers behind NAT
    pub relay: bool,

    /// Accepts calls over ephemeral (unauthenticated) sessions
    pub accepts_ephemeral: bool,
}

/// Resolved identity record of a peer
///
/// Immutable once built; a later resolution supersedes it with a new record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeRecord {
    /// Identity of the peer
    pub id: NodeId,

    /// Last-known network address (`host:port`)
    pub addr: String,

    /// Public key the identity is derived from
    pub public_key: [u8; 32],

    /// Advertised capabilities
    pub capabilities: NodeCapabilities,
}

impl NodeRecord {
    /// Build a record whose identity is derived from `public_key`
    #[must_use]
    pub fn new(
        addr: impl Into<String>,
        public_key: [u8; 32],
        capabilities: NodeCapabilities,
    ) -> Self {
        Self {
            id: NodeId::from_public_key(&public_key),
            addr: addr.into(),
            public_key,
            capabilities,
        }
    }

    /// Build a record with an externally supplied identity
    ///
    /// Use [`Self::verify_identity`] before trusting such a record.
    #[must_use]
    pub fn with_id(
        id: NodeId,
        addr: impl Into<String>,
        public_key: [u8; 32],
        capabilities: NodeCapabilities,
    ) -> Self {
        Self {
            id,
            addr: addr.into(),
            public_key,
            capabilities,
        }
    }

    /// Check that the identity is the one derived from the public key
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::IdentityMismatch`] if the key derives a different id.
    pub fn verify_identity(&self) -> Result<()> {
        let derived = NodeId::from_public_key(&self.public_key);
        if derived == self.id {
            Ok(())
        } else {
            Err(RpcError::IdentityMismatch {
                expected: self.id,
                actual: derived,
            })
        }
    }

    /// Whether this record describes `id`
    #[must_use]
    pub fn matches(&self, id: &NodeId) -> bool {
        self.id == *id
    }
}
