//! # Wayfind Core
//!
//! Shared vocabulary for the Wayfind workspace.
//!
//! This crate provides:
//! - Node identities ([`NodeId`]) and resolved identity records ([`NodeRecord`])
//! - The error taxonomy shared by dispatch and resolution ([`RpcError`])
//! - Caller-supplied cancellation ([`CallContext`])
//! - Typed method descriptors and DHT messages ([`RpcMethod`], [`FindNode`], [`Ping`])
//! - Dispatcher and resolver configuration types
//! - The payload codec
//!
//! ## Example
//!
//! ```
//! use wayfind_core::{NodeCapabilities, NodeId, NodeRecord, RpcMethod, FindNode};
//!
//! let record = NodeRecord::new("10.0.0.5:4661", [1u8; 32], NodeCapabilities::default());
//! assert_eq!(record.id, NodeId::from_public_key(&[1u8; 32]));
//! assert_eq!(FindNode::NAME, "DHT.FindNode");
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod codec;
pub mod config;
pub mod context;
pub mod error;
pub mod identity;
pub mod messages;

pub use config::{AnchorOrder, DispatcherConfig, ResolverConfig, WayfindConfig};
pub use context::CallContext;
pub use error::{Result, RpcError};
pub use identity::{NodeCapabilities, NodeId, NodeRecord};
pub use messages::{
    DHT_FIND_NODE, DHT_PING, FindNode, FindNodeRequest, FindNodeResponse, Ping, PingRequest,
    PingResponse, RpcMethod,
};
