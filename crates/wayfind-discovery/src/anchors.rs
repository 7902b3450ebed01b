//! Anchor sets
//!
//! Anchors are trusted nodes that answer `DHT.FindNode` for identities the
//! local stores do not know. The set is read once per resolution, so a
//! dynamic source may change between resolutions but never during one.

use wayfind_core::{NodeId, ResolverConfig};

/// Source of the current anchor set
pub trait AnchorSource: Send + Sync {
    /// Anchors in configured order; may be empty
    fn anchors(&self) -> Vec<NodeId>;
}

/// Fixed anchor list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StaticAnchors {
    anchors: Vec<NodeId>,
}

impl StaticAnchors {
    /// Create from an ordered list
    #[must_use]
    pub fn new(anchors: Vec<NodeId>) -> Self {
        Self { anchors }
    }

    /// Number of anchors
    #[must_use]
    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    /// Whether no anchors are configured
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

impl From<Vec<NodeId>> for StaticAnchors {
    fn from(anchors: Vec<NodeId>) -> Self {
        Self::new(anchors)
    }
}

impl From<&ResolverConfig> for StaticAnchors {
    fn from(config: &ResolverConfig) -> Self {
        Self::new(config.anchors.clone())
    }
}

impl AnchorSource for StaticAnchors {
    fn anchors(&self) -> Vec<NodeId> {
        self.anchors.clone()
    }
}
