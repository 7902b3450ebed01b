//! Dispatcher and resolver configuration
//!
//! These types are plain data: embedding applications deserialize them from
//! their own configuration files and hand them to the dispatcher and
//! resolver constructors.

use crate::error::{Result, RpcError};
use crate::identity::NodeId;
use crate::messages::DHT_PING;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WayfindConfig {
    /// Dispatcher configuration
    pub dispatcher: DispatcherConfig,

    /// Resolver configuration
    pub resolver: ResolverConfig,
}

impl WayfindConfig {
    /// Validate both sections
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidConfig`] describing the first problem found.
    pub fn validate(&self) -> Result<()> {
        self.dispatcher.validate()?;
        self.resolver.validate()
    }
}

/// Dispatcher configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatcherConfig {
    /// Methods dialed over ephemeral (unauthenticated) sessions
    pub ephemeral_methods: Vec<String>,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            ephemeral_methods: vec![DHT_PING.to_string()],
        }
    }
}

impl DispatcherConfig {
    /// Whether `method` dials in ephemeral session mode
    #[must_use]
    pub fn is_ephemeral(&self, method: &str) -> bool {
        self.ephemeral_methods.iter().any(|m| m == method)
    }

    /// Reject blank method names
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidConfig`] if a method name is blank.
    pub fn validate(&self) -> Result<()> {
        if self.ephemeral_methods.iter().any(|m| m.trim().is_empty()) {
            return Err(RpcError::invalid_config("ephemeral method name is blank"));
        }
        Ok(())
    }
}

/// Order in which anchors are tried during fallback resolution
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnchorOrder {
    /// Configured list order
    #[default]
    Configured,

    /// Fresh random permutation per resolution
    Shuffled,
}

/// Resolver configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Trusted anchor nodes, in preference order
    pub anchors: Vec<NodeId>,

    /// Anchor iteration order
    pub anchor_order: AnchorOrder,
}

impl ResolverConfig {
    /// Reject duplicate anchors
    ///
    /// An empty anchor list is valid; resolution by fallback then fails with
    /// [`RpcError::NoAnchorAvailable`].
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::InvalidConfig`] if an anchor is listed twice.
    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::with_capacity(self.anchors.len());
        for anchor in &self.anchors {
            if !seen.insert(anchor) {
                return Err(RpcError::InvalidConfig(
                    format!("anchor {} listed more than once", anchor.short()).into(),
                ));
            }
        }
        Ok(())
    }
}
