//! Node resolution
//!
//! Resolves an identity to an address or a full identity record:
//!
//! ```text
//! local store ──hit──▶ return (no network)
//!      │
//!    miss (UnknownIdentity)
//!      ▼
//! anchors, one at a time: DHT.FindNode { target }
//!      │            │
//!   success      failure ──▶ log, next anchor
//!      ▼
//! populate address cache + identity store (best effort) ──▶ return
//! ```
//!
//! Any other store error is returned as is, without touching the network.
//! Cancellation from the caller's context ends the anchor loop at once.

use crate::anchors::{AnchorSource, StaticAnchors};
use crate::store::{AddressCache, IdentityStore, StoreError};
use rand::seq::SliceRandom;
use std::sync::Arc;
use wayfind_core::{
    AnchorOrder, CallContext, FindNode, FindNodeRequest, NodeId, NodeRecord, ResolverConfig,
    Result, RpcError,
};
use wayfind_rpc::Dispatcher;

/// Cache-first resolver with anchor fallback
pub struct NodeResolver {
    dispatcher: Arc<Dispatcher>,
    addresses: Arc<dyn AddressCache>,
    identities: Arc<dyn IdentityStore>,
    anchors: Arc<dyn AnchorSource>,
    order: AnchorOrder,
}

impl NodeResolver {
    /// Create a resolver that queries anchors in configured order
    #[must_use]
    pub fn new(
        dispatcher: Arc<Dispatcher>,
        addresses: Arc<dyn AddressCache>,
        identities: Arc<dyn IdentityStore>,
        anchors: Arc<dyn AnchorSource>,
    ) -> Self {
        Self {
            dispatcher,
            addresses,
            identities,
            anchors,
            order: AnchorOrder::Configured,
        }
    }

    /// Create a resolver with the anchors and order from `config`
    #[must_use]
    pub fn from_config(
        dispatcher: Arc<Dispatcher>,
        addresses: Arc<dyn AddressCache>,
        identities: Arc<dyn IdentityStore>,
        config: &ResolverConfig,
    ) -> Self {
        Self::new(
            dispatcher,
            addresses,
            identities,
            Arc::new(StaticAnchors::from(config)),
        )
        .with_anchor_order(config.anchor_order)
    }

    /// Set the per-resolution anchor order
    #[must_use]
    pub fn with_anchor_order(mut self, order: AnchorOrder) -> Self {
        self.order = order;
        self
    }

    /// Resolve the address of `id`, waiting as long as it takes
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_address_with_context`].
    pub async fn resolve_address(&self, id: &NodeId) -> Result<String> {
        self.resolve_address_with_context(&CallContext::background(), id)
            .await
    }

    /// Resolve the address of `id`
    ///
    /// # Errors
    ///
    /// - [`RpcError::NoAnchorAvailable`] on a cache miss with no anchors
    /// - [`RpcError::AllAnchorsFailed`] when every anchor failed
    /// - [`RpcError::Canceled`] / [`RpcError::DeadlineExceeded`] when `ctx`
    ///   fired during the anchor queries
    /// - [`RpcError::Store`] when the cache itself failed
    pub async fn resolve_address_with_context(
        &self,
        ctx: &CallContext,
        id: &NodeId,
    ) -> Result<String> {
        match self.addresses.get(id) {
            Ok(addr) => {
                tracing::trace!("Address of {} served from cache", id.short());
                return Ok(addr);
            }
            Err(StoreError::UnknownIdentity(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let record = self.query_anchors(ctx, id).await?;
        Ok(record.addr)
    }

    /// Resolve the identity record of `id`, waiting as long as it takes
    ///
    /// # Errors
    ///
    /// See [`Self::resolve_record_with_context`].
    pub async fn resolve_record(&self, id: &NodeId) -> Result<NodeRecord> {
        self.resolve_record_with_context(&CallContext::background(), id)
            .await
    }

    /// Resolve the identity record of `id`
    ///
    /// A stored record that carries a different identity is treated as a
    /// miss and replaced by the anchors' answer.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_address_with_context`].
    pub async fn resolve_record_with_context(
        &self,
        ctx: &CallContext,
        id: &NodeId,
    ) -> Result<NodeRecord> {
        match self.identities.get(id) {
            Ok(record) if record.matches(id) => {
                tracing::trace!("Record of {} served from identity store", id.short());
                return Ok(record);
            }
            Ok(record) => {
                tracing::warn!(
                    "Stored record for {} carries identity {}, re-resolving",
                    id.short(),
                    record.id.short()
                );
            }
            Err(StoreError::UnknownIdentity(_)) => {}
            Err(e) => return Err(e.into()),
        }

        self.query_anchors(ctx, id).await
    }

    /// Re-resolve `id` from the anchors, ignoring and then overwriting the
    /// local stores
    ///
    /// For use after a connect failure suggests the cached entry is stale.
    ///
    /// # Errors
    ///
    /// Same as [`Self::resolve_address_with_context`], minus store errors.
    pub async fn refresh_record(&self, ctx: &CallContext, id: &NodeId) -> Result<NodeRecord> {
        self.query_anchors(ctx, id).await
    }

    async fn query_anchors(&self, ctx: &CallContext, id: &NodeId) -> Result<NodeRecord> {
        let mut anchors = self.anchors.anchors();
        if anchors.is_empty() {
            tracing::warn!("No anchors configured, cannot resolve {}", id.short());
            return Err(RpcError::NoAnchorAvailable);
        }
        if self.order == AnchorOrder::Shuffled {
            anchors.shuffle(&mut rand::thread_rng());
        }

        let attempted = anchors.len();
        let mut last_error = RpcError::NoAnchorAvailable;

        for anchor in &anchors {
            if let Err(e) = ctx.check() {
                tracing::debug!("Resolution of {} stopped: {}", id.short(), e);
                return Err(e);
            }
            match self.find_node(ctx, anchor, id).await {
                Ok(record) => {
                    tracing::debug!(
                        "Resolved {} to {} via anchor {}",
                        id.short(),
                        record.addr,
                        anchor.short()
                    );
                    self.populate(&record);
                    return Ok(record);
                }
                Err(e) if e.is_cancellation() => {
                    tracing::debug!("Resolution of {} stopped: {}", id.short(), e);
                    return Err(e);
                }
                Err(e) => {
                    tracing::warn!(
                        "Anchor {} failed to resolve {}: {}",
                        anchor.short(),
                        id.short(),
                        e
                    );
                    last_error = e;
                }
            }
        }

        // The context may have fired while the last anchor was failing.
        if let Err(e) = ctx.check() {
            tracing::debug!("Resolution of {} stopped: {}", id.short(), e);
            return Err(e);
        }

        tracing::error!("All {} anchors failed to resolve {}", attempted, id.short());
        Err(RpcError::AllAnchorsFailed {
            attempted,
            last: Box::new(last_error),
        })
    }

    async fn find_node(
        &self,
        ctx: &CallContext,
        anchor: &NodeId,
        target: &NodeId,
    ) -> Result<NodeRecord> {
        let reply = self
            .dispatcher
            .call::<FindNode>(ctx, anchor, &FindNodeRequest { target: *target })
            .await?;

        let record = reply.node;
        if !record.matches(target) {
            return Err(RpcError::IdentityMismatch {
                expected: *target,
                actual: record.id,
            });
        }
        record.verify_identity()?;
        Ok(record)
    }

    fn populate(&self, record: &NodeRecord) {
        if let Err(e) = self.addresses.set(&record.id, &record.addr) {
            tracing::warn!("Failed to cache address of {}: {}", record.id.short(), e);
        }
        if let Err(e) = self.identities.set(record) {
            tracing::warn!("Failed to store record of {}: {}", record.id.short(), e);
        }
    }
}

impl std::fmt::Debug for NodeResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NodeResolver")
            .field("dispatcher", &self.dispatcher)
            .field("order", &self.order)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryAddressCache, MemoryIdentityStore};
    use std::borrow::Cow;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio_util::sync::CancellationToken;
    use wayfind_core::{DispatcherConfig, FindNodeResponse, NodeCapabilities};
    use wayfind_rpc::SessionMode;
    use wayfind_rpc::memory::{MemoryNetwork, MemoryService};

    fn anchor(seed: u8) -> NodeId {
        NodeId::from_bytes([seed; 32])
    }

    fn record(key: u8, addr: &str) -> NodeRecord {
        NodeRecord::new(addr, [key; 32], NodeCapabilities::default())
    }

    /// Anchor that knows the given records
    fn directory(records: &[NodeRecord]) -> MemoryService {
        let known: HashMap<NodeId, NodeRecord> =
            records.iter().map(|r| (r.id, r.clone())).collect();
        MemoryService::new().handle::<FindNode, _>(move |req: FindNodeRequest| {
            known
                .get(&req.target)
                .cloned()
                .map(|node| FindNodeResponse { node })
                .ok_or_else(|| RpcError::remote("DHT.FindNode", "target not found"))
        })
    }

    struct Fixture {
        network: Arc<MemoryNetwork>,
        addresses: Arc<MemoryAddressCache>,
        identities: Arc<MemoryIdentityStore>,
        resolver: NodeResolver,
    }

    fn fixture(anchors: Vec<NodeId>) -> Fixture {
        let network = Arc::new(MemoryNetwork::new());
        let dispatcher = Arc::new(Dispatcher::new(
            network.clone(),
            network.clone(),
            DispatcherConfig::default(),
        ));
        let addresses = Arc::new(MemoryAddressCache::new());
        let identities = Arc::new(MemoryIdentityStore::new());
        let resolver = NodeResolver::new(
            dispatcher,
            addresses.clone(),
            identities.clone(),
            Arc::new(StaticAnchors::new(anchors)),
        );
        Fixture {
            network,
            addresses,
            identities,
            resolver,
        }
    }

    fn dialed(network: &MemoryNetwork) -> Vec<NodeId> {
        network.dials().into_iter().map(|(id, _)| id).collect()
    }

    /// Store whose reads miss and whose writes always fail
    struct BrokenWrites;

    impl AddressCache for BrokenWrites {
        fn get(&self, id: &NodeId) -> std::result::Result<String, StoreError> {
            Err(StoreError::UnknownIdentity(*id))
        }

        fn set(&self, _id: &NodeId, _addr: &str) -> std::result::Result<(), StoreError> {
            Err(StoreError::Backend(Cow::Borrowed("read-only")))
        }
    }

    impl IdentityStore for BrokenWrites {
        fn get(&self, id: &NodeId) -> std::result::Result<NodeRecord, StoreError> {
            Err(StoreError::UnknownIdentity(*id))
        }

        fn set(&self, _record: &NodeRecord) -> std::result::Result<(), StoreError> {
            Err(StoreError::Backend(Cow::Borrowed("read-only")))
        }
    }

    /// Store whose reads fail outright
    struct BrokenReads;

    impl AddressCache for BrokenReads {
        fn get(&self, _id: &NodeId) -> std::result::Result<String, StoreError> {
            Err(StoreError::Backend(Cow::Borrowed("corrupt index")))
        }

        fn set(&self, _id: &NodeId, _addr: &str) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    impl IdentityStore for BrokenReads {
        fn get(&self, _id: &NodeId) -> std::result::Result<NodeRecord, StoreError> {
            Err(StoreError::Backend(Cow::Borrowed("corrupt index")))
        }

        fn set(&self, _record: &NodeRecord) -> std::result::Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_cached_address_needs_no_network() {
        let f = fixture(vec![anchor(1)]);
        let target = record(7, "10.0.0.7:4661");
        f.addresses.set(&target.id, &target.addr).unwrap();

        let addr = f.resolver.resolve_address(&target.id).await.unwrap();

        assert_eq!(addr, "10.0.0.7:4661");
        assert!(f.network.dials().is_empty());
    }

    #[tokio::test]
    async fn test_cached_record_needs_no_network() {
        let f = fixture(vec![anchor(1)]);
        let target = record(7, "10.0.0.7:4661");
        f.identities.set(&target).unwrap();

        let found = f.resolver.resolve_record(&target.id).await.unwrap();

        assert_eq!(found, target);
        assert!(f.network.dials().is_empty());
    }

    #[tokio::test]
    async fn test_second_anchor_answers_after_first_fails() {
        let (a, b) = (anchor(1), anchor(2));
        let f = fixture(vec![a, b]);
        let target = record(7, "10.0.0.5:4661");
        f.network.add_unreachable(a);
        f.network.add_peer(b, directory(std::slice::from_ref(&target)));

        let addr = f.resolver.resolve_address(&target.id).await.unwrap();

        assert_eq!(addr, "10.0.0.5:4661");
        assert_eq!(f.addresses.get(&target.id).unwrap(), "10.0.0.5:4661");
        assert_eq!(f.identities.get(&target.id).unwrap(), target);
        assert_eq!(dialed(&f.network), vec![a, b]);
        assert!(
            f.network
                .dials()
                .iter()
                .all(|(_, mode)| *mode == SessionMode::Authenticated)
        );
    }

    #[tokio::test]
    async fn test_first_success_wins() {
        let (a, b) = (anchor(1), anchor(2));
        let f = fixture(vec![a, b]);
        let target = record(7, "10.0.0.5:4661");
        f.network.add_peer(a, directory(std::slice::from_ref(&target)));
        f.network.add_peer(b, directory(std::slice::from_ref(&target)));

        f.resolver.resolve_record(&target.id).await.unwrap();

        assert_eq!(dialed(&f.network), vec![a]);
    }

    #[tokio::test]
    async fn test_empty_anchor_set() {
        let f = fixture(vec![]);
        let target = anchor(9);

        assert_eq!(
            f.resolver.resolve_record(&target).await.unwrap_err(),
            RpcError::NoAnchorAvailable
        );
        assert_eq!(
            f.resolver.resolve_address(&target).await.unwrap_err(),
            RpcError::NoAnchorAvailable
        );
        assert!(f.network.dials().is_empty());
    }

    #[tokio::test]
    async fn test_all_anchors_fail_after_each_tried_once() {
        let anchors = vec![anchor(1), anchor(2), anchor(3)];
        let f = fixture(anchors.clone());
        f.network.add_unreachable(anchor(1));
        f.network.add_refusing(anchor(2));
        f.network.add_peer(anchor(3), directory(&[]));

        let err = f.resolver.resolve_address(&anchor(42)).await.unwrap_err();

        match err {
            RpcError::AllAnchorsFailed { attempted, last } => {
                assert_eq!(attempted, 3);
                assert_eq!(*last, RpcError::remote("DHT.FindNode", "target not found"));
            }
            other => panic!("Expected AllAnchorsFailed, got {other:?}"),
        }
        assert_eq!(dialed(&f.network), anchors);
        assert!(f.addresses.is_empty());
        assert!(f.identities.is_empty());
    }

    #[tokio::test]
    async fn test_store_failure_skips_fallback() {
        let network = Arc::new(MemoryNetwork::new());
        let dispatcher = Arc::new(Dispatcher::new(
            network.clone(),
            network.clone(),
            DispatcherConfig::default(),
        ));
        let resolver = NodeResolver::new(
            dispatcher,
            Arc::new(BrokenReads),
            Arc::new(BrokenReads),
            Arc::new(StaticAnchors::new(vec![anchor(1)])),
        );

        assert_eq!(
            resolver.resolve_address(&anchor(5)).await.unwrap_err(),
            RpcError::store("corrupt index")
        );
        assert_eq!(
            resolver.resolve_record(&anchor(5)).await.unwrap_err(),
            RpcError::store("corrupt index")
        );
        assert!(network.dials().is_empty());
    }

    #[tokio::test]
    async fn test_cache_write_failures_are_swallowed() {
        let network = Arc::new(MemoryNetwork::new());
        let dispatcher = Arc::new(Dispatcher::new(
            network.clone(),
            network.clone(),
            DispatcherConfig::default(),
        ));
        let target = record(7, "10.0.0.5:4661");
        network.add_peer(anchor(1), directory(std::slice::from_ref(&target)));
        let resolver = NodeResolver::new(
            dispatcher,
            Arc::new(BrokenWrites),
            Arc::new(BrokenWrites),
            Arc::new(StaticAnchors::new(vec![anchor(1)])),
        );

        assert_eq!(resolver.resolve_record(&target.id).await.unwrap(), target);
        assert_eq!(
            resolver.resolve_address(&target.id).await.unwrap(),
            "10.0.0.5:4661"
        );
    }

    #[tokio::test]
    async fn test_mismatched_reply_counts_as_anchor_failure() {
        let (a, b) = (anchor(1), anchor(2));
        let f = fixture(vec![a, b]);
        let target = record(7, "10.0.0.5:4661");
        let impostor = record(8, "10.0.0.66:4661");

        f.network.add_peer(
            a,
            MemoryService::new().handle::<FindNode, _>(move |_req: FindNodeRequest| {
                Ok(FindNodeResponse {
                    node: impostor.clone(),
                })
            }),
        );
        f.network.add_peer(b, directory(std::slice::from_ref(&target)));

        let found = f.resolver.resolve_record(&target.id).await.unwrap();

        assert_eq!(found, target);
        assert_eq!(dialed(&f.network), vec![a, b]);
    }

    #[tokio::test]
    async fn test_forged_record_is_rejected() {
        let a = anchor(1);
        let f = fixture(vec![a]);
        let target = record(7, "10.0.0.5:4661");
        let forged = NodeRecord::with_id(
            target.id,
            "10.0.0.66:4661",
            [8; 32],
            NodeCapabilities::default(),
        );
        f.network.add_peer(a, directory(&[forged]));

        match f.resolver.resolve_record(&target.id).await.unwrap_err() {
            RpcError::AllAnchorsFailed { last, .. } => {
                assert!(matches!(*last, RpcError::IdentityMismatch { .. }));
            }
            other => panic!("Expected AllAnchorsFailed, got {other:?}"),
        }
        assert!(f.identities.is_empty());
    }

    #[tokio::test]
    async fn test_stale_record_with_wrong_identity_is_replaced() {
        let a = anchor(1);
        let f = fixture(vec![a]);
        let target = record(7, "10.0.0.5:4661");
        f.identities.insert_under(target.id, record(8, "10.0.0.66:4661"));
        f.network.add_peer(a, directory(std::slice::from_ref(&target)));

        let found = f.resolver.resolve_record(&target.id).await.unwrap();

        assert_eq!(found, target);
        assert_eq!(f.identities.get(&target.id).unwrap(), target);
    }

    #[tokio::test]
    async fn test_refresh_bypasses_cache() {
        let a = anchor(1);
        let f = fixture(vec![a]);
        let target = record(7, "10.0.0.5:4661");
        f.addresses.set(&target.id, "10.0.0.1:4661").unwrap();
        f.identities.set(&record(7, "10.0.0.1:4661")).unwrap();
        f.network.add_peer(a, directory(std::slice::from_ref(&target)));

        let fresh = f
            .resolver
            .refresh_record(&CallContext::background(), &target.id)
            .await
            .unwrap();

        assert_eq!(fresh.addr, "10.0.0.5:4661");
        assert_eq!(f.addresses.get(&target.id).unwrap(), "10.0.0.5:4661");
        assert_eq!(f.identities.get(&target.id).unwrap(), target);
        assert_eq!(dialed(&f.network), vec![a]);
    }

    #[tokio::test]
    async fn test_cancellation_stops_fallback_then_later_call_populates() {
        let (a, b) = (anchor(1), anchor(2));
        let f = fixture(vec![a, b]);
        let target = record(7, "10.0.0.5:4661");
        f.network.add_peer(a, directory(&[]).hanging());
        f.network.add_peer(b, directory(std::slice::from_ref(&target)));

        let token = CancellationToken::new();
        let ctx = CallContext::with_token(token.clone());
        let canceller = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let err = f
            .resolver
            .resolve_address_with_context(&ctx, &target.id)
            .await
            .unwrap_err();
        canceller.await.unwrap();

        assert_eq!(err, RpcError::Canceled);
        assert_eq!(dialed(&f.network), vec![a]);
        assert!(f.addresses.is_empty());

        // Anchor A comes back with the answer.
        f.network.add_peer(a, directory(std::slice::from_ref(&target)));
        let addr = f.resolver.resolve_address(&target.id).await.unwrap();

        assert_eq!(addr, "10.0.0.5:4661");
        assert_eq!(f.addresses.get(&target.id).unwrap(), "10.0.0.5:4661");
    }

    #[tokio::test]
    async fn test_canceled_context_dials_nothing() {
        let anchors = vec![anchor(1), anchor(2), anchor(3)];
        let f = fixture(anchors.clone());
        for id in &anchors {
            f.network.add_unreachable(*id);
        }
        let token = CancellationToken::new();
        token.cancel();
        let ctx = CallContext::with_token(token);

        let err = f
            .resolver
            .resolve_address_with_context(&ctx, &anchor(42))
            .await
            .unwrap_err();

        assert_eq!(err, RpcError::Canceled);
        assert!(f.network.dials().is_empty());
    }

    /// Pool that cancels the caller's token while failing the dial
    struct CancelOnDial {
        token: CancellationToken,
        dials: std::sync::atomic::AtomicUsize,
    }

    #[async_trait::async_trait]
    impl wayfind_rpc::ConnectionPool for CancelOnDial {
        async fn acquire(
            &self,
            _node: &NodeId,
            _mode: SessionMode,
        ) -> std::result::Result<wayfind_rpc::SharedStream, wayfind_rpc::PoolError> {
            self.dials.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            self.token.cancel();
            Err(wayfind_rpc::PoolError::Unreachable(Cow::Borrowed("peer is down")))
        }
    }

    #[tokio::test]
    async fn test_cancel_during_failed_dial_is_reported() {
        for anchors in [vec![anchor(1)], vec![anchor(1), anchor(2), anchor(3)]] {
            let token = CancellationToken::new();
            let pool = Arc::new(CancelOnDial {
                token: token.clone(),
                dials: std::sync::atomic::AtomicUsize::new(0),
            });
            let dispatcher = Arc::new(Dispatcher::new(
                pool.clone(),
                Arc::new(MemoryNetwork::new()),
                DispatcherConfig::default(),
            ));
            let addresses = Arc::new(MemoryAddressCache::new());
            let resolver = NodeResolver::new(
                dispatcher,
                addresses.clone(),
                Arc::new(MemoryIdentityStore::new()),
                Arc::new(StaticAnchors::new(anchors)),
            );

            let err = resolver
                .resolve_address_with_context(&CallContext::with_token(token), &anchor(42))
                .await
                .unwrap_err();

            assert_eq!(err, RpcError::Canceled);
            assert_eq!(pool.dials.load(std::sync::atomic::Ordering::SeqCst), 1);
            assert!(addresses.is_empty());
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_spans_all_anchors() {
        let anchors = vec![anchor(1), anchor(2), anchor(3)];
        let f = fixture(anchors);
        let target = record(7, "10.0.0.5:4661");
        for seed in 1..=3 {
            f.network.add_peer(
                anchor(seed),
                directory(std::slice::from_ref(&target)).with_latency(Duration::from_secs(3)),
            );
        }

        let ctx = CallContext::with_timeout(Duration::from_secs(2));
        let err = f
            .resolver
            .resolve_record_with_context(&ctx, &target.id)
            .await
            .unwrap_err();

        assert_eq!(err, RpcError::DeadlineExceeded);
        assert_eq!(dialed(&f.network), vec![anchor(1)]);
    }

    #[tokio::test]
    async fn test_shuffled_order_still_tries_every_anchor_once() {
        let anchors: Vec<NodeId> = (1..=6).map(anchor).collect();
        let f = fixture(anchors.clone());
        for id in &anchors {
            f.network.add_unreachable(*id);
        }
        let resolver = f.resolver.with_anchor_order(AnchorOrder::Shuffled);

        let err = resolver.resolve_address(&anchor(99)).await.unwrap_err();
        assert!(matches!(err, RpcError::AllAnchorsFailed { attempted: 6, .. }));

        let mut tried = dialed(&f.network);
        tried.sort();
        assert_eq!(tried, anchors);
    }

    #[tokio::test]
    async fn test_from_config() {
        let network = Arc::new(MemoryNetwork::new());
        let dispatcher = Arc::new(Dispatcher::new(
            network.clone(),
            network.clone(),
            DispatcherConfig::default(),
        ));
        let target = record(7, "10.0.0.5:4661");
        network.add_peer(anchor(3), directory(std::slice::from_ref(&target)));

        let config = ResolverConfig {
            anchors: vec![anchor(3)],
            anchor_order: AnchorOrder::Configured,
        };
        let resolver = NodeResolver::from_config(
            dispatcher,
            Arc::new(MemoryAddressCache::new()),
            Arc::new(MemoryIdentityStore::new()),
            &config,
        );

        assert_eq!(
            resolver.resolve_address(&target.id).await.unwrap(),
            "10.0.0.5:4661"
        );
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #![proptest_config(ProptestConfig::with_cases(48))]

            /// Anchors are tried in order up to and including the first one that answers
            #[test]
            fn fallback_stops_at_first_success(
                answers in prop::collection::vec(any::<bool>(), 1..8),
            ) {
                let runtime = tokio::runtime::Builder::new_current_thread()
                    .enable_time()
                    .build()
                    .unwrap();

                let anchors: Vec<NodeId> = (1..=answers.len())
                    .map(|i| anchor(u8::try_from(i).unwrap()))
                    .collect();
                let target = record(7, "10.0.0.5:4661");

                let (outcome, tried, cached) = runtime.block_on(async {
                    let f = fixture(anchors.clone());
                    for (id, ok) in anchors.iter().zip(&answers) {
                        if *ok {
                            f.network.add_peer(*id, directory(std::slice::from_ref(&target)));
                        } else {
                            f.network.add_unreachable(*id);
                        }
                    }
                    let outcome = f.resolver.resolve_address(&target.id).await;
                    (outcome, dialed(&f.network), f.addresses.get(&target.id).ok())
                });

                match answers.iter().position(|ok| *ok) {
                    Some(first) => {
                        prop_assert_eq!(outcome.unwrap(), "10.0.0.5:4661");
                        prop_assert_eq!(&tried[..], &anchors[..=first]);
                        prop_assert_eq!(cached.as_deref(), Some("10.0.0.5:4661"));
                    }
                    None => {
                        let is_exhausted = matches!(
                            outcome,
                            Err(RpcError::AllAnchorsFailed { attempted, .. })
                                if attempted == anchors.len()
                        );
                        prop_assert!(is_exhausted);
                        prop_assert_eq!(&tried, &anchors);
                        prop_assert_eq!(cached, None);
                    }
                }
            }
        }
    }
}
