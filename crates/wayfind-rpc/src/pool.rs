//! Connection pool contract
//!
//! The pool hands out a duplex frame stream per peer identity. Streams are
//! shared handles: the pool may serve several calls to the same peer over one
//! multiplexed session, and the dispatcher only ever acquires a handle for the
//! duration of one call and releases it afterwards.
//!
//! # Session Modes
//!
//! ```text
//! Authenticated   identity verified during session setup (default)
//! Ephemeral       anonymous session, usable before the peer can be resolved
//!                 or mutually verified (liveness / announce calls)
//! ```

use async_trait::async_trait;
use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::Arc;
use thiserror::Error;
use wayfind_core::NodeId;

/// How the pool should establish the session behind a stream
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum SessionMode {
    /// Mutually authenticated session
    #[default]
    Authenticated,

    /// Unauthenticated session that needs no prior identity verification
    Ephemeral,
}

impl fmt::Display for SessionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated => write!(f, "authenticated"),
            Self::Ephemeral => write!(f, "ephemeral"),
        }
    }
}

/// Errors reported by a connection pool
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PoolError {
    /// Peer could not be reached
    #[error("Peer unreachable: {0}")]
    Unreachable(Cow<'static, str>),
}

/// A pooled duplex frame stream to one peer
#[async_trait]
pub trait PooledStream: Send + Sync + fmt::Debug {
    /// Peer at the other end
    fn peer(&self) -> NodeId;

    /// Session mode the stream was acquired with
    fn mode(&self) -> SessionMode;

    /// Send one frame
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the session is broken.
    async fn send(&self, frame: Vec<u8>) -> io::Result<()>;

    /// Receive one frame
    ///
    /// # Errors
    ///
    /// Returns an I/O error if the session is broken or closed.
    async fn recv(&self) -> io::Result<Vec<u8>>;

    /// Hand the stream back to the pool
    ///
    /// Idempotent: releasing an already-released stream is a no-op.
    fn release(&self);

    /// Whether [`Self::release`] has been called
    fn is_released(&self) -> bool;
}

/// Shared stream handle
pub type SharedStream = Arc<dyn PooledStream>;

/// Source of pooled streams keyed by peer identity
#[async_trait]
pub trait ConnectionPool: Send + Sync {
    /// Acquire a stream to `node`
    ///
    /// # Errors
    ///
    /// Returns [`PoolError`] if no session to the peer can be obtained.
    async fn acquire(&self, node: &NodeId, mode: SessionMode) -> Result<SharedStream, PoolError>;
}
