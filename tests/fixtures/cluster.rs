//! Anchor cluster fixture
//!
//! An in-process network with a handful of anchors that share one node
//! directory. Anchors answer `DHT.FindNode` from the directory and add
//! verified records to it on `DHT.Ping`, so a node that announces itself can
//! then be resolved by others.
//!
//! # Example
//!
//! ```no_run
//! use wayfind_integration_tests::fixtures::Cluster;
//!
//! # async fn example() {
//! let cluster = Cluster::new(2);
//! let target = Cluster::node_record(7, "10.0.0.5:4661");
//! cluster.publish(target.clone());
//!
//! let addr = cluster.resolver().resolve_address(&target.id).await.unwrap();
//! assert_eq!(addr, "10.0.0.5:4661");
//! # }
//! ```

use dashmap::DashMap;
use std::sync::Arc;
use wayfind_core::{
    AnchorOrder, DispatcherConfig, FindNode, FindNodeRequest, FindNodeResponse,
    NodeCapabilities, NodeId, NodeRecord, Ping, PingRequest, PingResponse, ResolverConfig,
    RpcError,
};
use wayfind_discovery::{MemoryAddressCache, MemoryIdentityStore, NodeResolver};
use wayfind_rpc::Dispatcher;
use wayfind_rpc::memory::{MemoryNetwork, MemoryService};

type Directory = Arc<DashMap<NodeId, NodeRecord>>;

/// In-process network with anchors and a local node's stores
pub struct Cluster {
    /// Shared network
    pub network: Arc<MemoryNetwork>,
    /// Dispatcher of the local node
    pub dispatcher: Arc<Dispatcher>,
    /// Address cache of the local node
    pub addresses: Arc<MemoryAddressCache>,
    /// Identity store of the local node
    pub identities: Arc<MemoryIdentityStore>,
    /// Anchor identities, in configured order
    pub anchors: Vec<NodeId>,
    directory: Directory,
}

impl Cluster {
    /// Build a cluster with `anchor_count` serving anchors
    pub fn new(anchor_count: u8) -> Self {
        let network = Arc::new(MemoryNetwork::new());
        let directory: Directory = Arc::new(DashMap::new());

        let anchors: Vec<NodeId> = (0..anchor_count)
            .map(|seed| {
                let record = Self::anchor_record(seed);
                network.add_peer(record.id, Self::anchor_service(record.id, directory.clone()));
                record.id
            })
            .collect();

        let dispatcher = Arc::new(Dispatcher::new(
            network.clone(),
            network.clone(),
            DispatcherConfig::default(),
        ));

        Self {
            network,
            dispatcher,
            addresses: Arc::new(MemoryAddressCache::new()),
            identities: Arc::new(MemoryIdentityStore::new()),
            anchors,
            directory,
        }
    }

    /// Record of a regular node derived from `seed`
    pub fn node_record(seed: u8, addr: &str) -> NodeRecord {
        NodeRecord::new(addr, [seed; 32], NodeCapabilities::default())
    }

    fn anchor_record(seed: u8) -> NodeRecord {
        NodeRecord::new(
            format!("10.0.1.{seed}:4661"),
            [200u8.wrapping_add(seed); 32],
            NodeCapabilities {
                anchor: true,
                accepts_ephemeral: true,
                ..NodeCapabilities::default()
            },
        )
    }

    fn anchor_service(anchor: NodeId, directory: Directory) -> MemoryService {
        let lookups = directory.clone();
        MemoryService::new()
            .handle::<FindNode, _>(move |req: FindNodeRequest| {
                lookups
                    .get(&req.target)
                    .map(|entry| FindNodeResponse {
                        node: entry.value().clone(),
                    })
                    .ok_or_else(|| RpcError::remote("DHT.FindNode", "target not found"))
            })
            .handle::<Ping, _>(move |req: PingRequest| {
                let accepted = req.node.verify_identity().is_ok();
                if accepted {
                    directory.insert(req.node.id, req.node);
                }
                Ok(PingResponse {
                    sender_id: anchor,
                    accepted,
                })
            })
    }

    /// Make `record` known to every anchor
    pub fn publish(&self, record: NodeRecord) {
        self.directory.insert(record.id, record);
    }

    /// Whether the anchors know `id`
    pub fn is_published(&self, id: &NodeId) -> bool {
        self.directory.contains_key(id)
    }

    /// Make anchor `index` unreachable
    pub fn take_down(&self, index: usize) {
        self.network.add_unreachable(self.anchors[index]);
    }

    /// Make anchor `index` drop every session it accepts
    pub fn break_sessions(&self, index: usize) {
        self.network.add_disconnecting(self.anchors[index]);
    }

    /// Make anchor `index` serve again
    pub fn bring_up(&self, index: usize) {
        let anchor = self.anchors[index];
        self.network
            .add_peer(anchor, Self::anchor_service(anchor, self.directory.clone()));
    }

    /// Resolver configuration listing this cluster's anchors
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            anchors: self.anchors.clone(),
            anchor_order: AnchorOrder::Configured,
        }
    }

    /// Resolver over the local node's stores and all anchors
    pub fn resolver(&self) -> NodeResolver {
        self.resolver_with(&self.resolver_config())
    }

    /// Resolver over the local node's stores with a custom configuration
    pub fn resolver_with(&self, config: &ResolverConfig) -> NodeResolver {
        NodeResolver::from_config(
            self.dispatcher.clone(),
            self.addresses.clone(),
            self.identities.clone(),
            config,
        )
    }

    /// Resolver for another node: same network and anchors, empty stores
    pub fn peer_resolver(&self) -> NodeResolver {
        NodeResolver::from_config(
            self.dispatcher.clone(),
            Arc::new(MemoryAddressCache::new()),
            Arc::new(MemoryIdentityStore::new()),
            &self.resolver_config(),
        )
    }

    /// Anchors dialed so far, in order
    pub fn dialed(&self) -> Vec<NodeId> {
        self.network.dials().into_iter().map(|(id, _)| id).collect()
    }
}
