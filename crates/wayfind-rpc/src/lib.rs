//! # Wayfind RPC
//!
//! Remote call dispatch over pooled peer streams.
//!
//! This crate provides:
//! - The connection pool contract ([`ConnectionPool`], [`PooledStream`], [`SessionMode`])
//! - The RPC client contract ([`RpcTransport`], [`RpcClient`])
//! - The cancellable [`Dispatcher`], which guarantees stream release and
//!   client close on every exit path
//! - An in-process network ([`memory::MemoryNetwork`]) implementing both
//!   contracts
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use wayfind_core::{CallContext, DispatcherConfig, FindNode, FindNodeRequest, NodeId};
//! use wayfind_rpc::Dispatcher;
//! use wayfind_rpc::memory::MemoryNetwork;
//!
//! # async fn example() -> wayfind_core::Result<()> {
//! let network = Arc::new(MemoryNetwork::new());
//! let dispatcher = Dispatcher::new(network.clone(), network, DispatcherConfig::default());
//!
//! let anchor = NodeId::from_bytes([1; 32]);
//! let reply = dispatcher
//!     .call::<FindNode>(
//!         &CallContext::background(),
//!         &anchor,
//!         &FindNodeRequest { target: NodeId::from_bytes([2; 32]) },
//!     )
//!     .await?;
//! println!("{}", reply.node.addr);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod dispatcher;
pub mod memory;
pub mod pool;
pub mod transport;

pub use dispatcher::Dispatcher;
pub use pool::{ConnectionPool, PoolError, PooledStream, SessionMode, SharedStream};
pub use transport::{Completion, RpcClient, RpcTransport, TransportError, TransportResult};
