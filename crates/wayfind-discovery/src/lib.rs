//! # Wayfind Discovery
//!
//! Finding peers by identity.
//!
//! This crate provides:
//! - Address cache and identity store contracts with in-memory implementations
//! - Anchor sets ([`AnchorSource`], [`StaticAnchors`])
//! - The cache-first [`NodeResolver`] with sequential anchor fallback
//! - Anchor announce ([`announce`]) over ephemeral sessions
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wayfind_core::{DispatcherConfig, NodeId, ResolverConfig};
//! use wayfind_discovery::{MemoryAddressCache, MemoryIdentityStore, NodeResolver};
//! use wayfind_rpc::Dispatcher;
//! use wayfind_rpc::memory::MemoryNetwork;
//!
//! # async fn example() -> wayfind_core::Result<()> {
//! let network = Arc::new(MemoryNetwork::new());
//! let dispatcher = Arc::new(Dispatcher::new(
//!     network.clone(),
//!     network,
//!     DispatcherConfig::default(),
//! ));
//! let config = ResolverConfig {
//!     anchors: vec![NodeId::from_bytes([1; 32])],
//!     ..ResolverConfig::default()
//! };
//! let resolver = NodeResolver::from_config(
//!     dispatcher,
//!     Arc::new(MemoryAddressCache::new()),
//!     Arc::new(MemoryIdentityStore::new()),
//!     &config,
//! );
//!
//! let addr = resolver.resolve_address(&NodeId::from_bytes([7; 32])).await?;
//! println!("{addr}");
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod anchors;
pub mod announce;
pub mod resolver;
pub mod store;

pub use anchors::{AnchorSource, StaticAnchors};
pub use announce::{announce, announce_with_context};
pub use resolver::NodeResolver;
pub use store::{
    AddressCache, IdentityStore, MemoryAddressCache, MemoryIdentityStore, StoreError,
};
