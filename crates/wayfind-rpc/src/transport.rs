//! RPC transport contract
//!
//! A transport turns a pooled stream into an RPC client. The client frames a
//! method name plus payload onto the stream and decodes the reply; the wire
//! format is the transport's business. The dispatcher only needs two things
//! from a client: start one invocation and get a completion back, and close.
//!
//! ```text
//!   Dispatcher ──wrap(stream)──▶ RpcTransport
//!       │                           │
//!       │◀──── Box<dyn RpcClient> ──┘
//!       │
//!       ├── invoke(method, body) ──▶ Completion (oneshot)
//!       └── close()
//! ```

use crate::pool::SharedStream;
use async_trait::async_trait;
use std::borrow::Cow;
use std::io;
use thiserror::Error;
use tokio::sync::oneshot;

/// Transport layer errors
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error from the underlying stream
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Stream was already released or closed
    #[error("Stream is closed")]
    Closed,

    /// RPC-level handshake over the stream failed
    #[error("RPC handshake failed: {0}")]
    Handshake(Cow<'static, str>),
}

/// Result type for transport operations
pub type TransportResult<T> = Result<T, TransportError>;

/// Completion signal of one invocation
///
/// Resolves to the raw reply bytes or the invocation's error. A dropped
/// sender means the client gave up on the call without a reply.
pub type Completion = oneshot::Receiver<wayfind_core::Result<Vec<u8>>>;

/// Handle for issuing calls over one stream
pub trait RpcClient: Send + Sync {
    /// Start one invocation of `method`
    ///
    /// Must not block: the call proceeds in the background and reports
    /// through the returned [`Completion`]. Remote application errors are
    /// reported as [`wayfind_core::RpcError::Remote`].
    fn invoke(&self, method: &str, request: Vec<u8>) -> Completion;

    /// Close the client
    ///
    /// Calls already in flight may still complete; their completions simply
    /// have no observer once the dispatcher has returned.
    fn close(&self);
}

/// Builds RPC clients over pooled streams
#[async_trait]
pub trait RpcTransport: Send + Sync {
    /// Wrap `stream` in an RPC client
    ///
    /// The transport must not release the stream; the caller owns its
    /// lifecycle whether or not wrapping succeeds.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] if the client cannot be set up.
    async fn wrap(&self, stream: SharedStream) -> TransportResult<Box<dyn RpcClient>>;
}
