//! Error types for remote calls and node resolution
//!
//! A single taxonomy is shared by the dispatcher, the resolver and announce so
//! callers can match on one enum regardless of which layer failed.
//!
//! # Error Categories
//!
//! - **Transient**: may succeed on retry (dial failures, broken streams)
//! - **Permanent**: will not succeed without intervention (no anchors, bad config)
//! - **Cancellation**: the caller stopped waiting (`Canceled`, `DeadlineExceeded`)
//!
//! # Example
//!
//! ```
//! use wayfind_core::RpcError;
//!
//! fn handle_error(err: RpcError) {
//!     if err.is_cancellation() {
//!         return;
//!     }
//!     if err.should_retry() {
//!         println!("retrying after: {err}");
//!     } else {
//!         println!("giving up: {err}");
//!     }
//! }
//! ```

use crate::identity::NodeId;
use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur while calling a peer or resolving a node
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RpcError {
    // ============ Dispatch Errors ============
    /// No stream could be acquired for the target
    #[error("Dial to node {node} failed: {reason}")]
    DialFailed {
        /// Target node
        node: NodeId,
        /// Pool-supplied reason
        reason: Cow<'static, str>,
    },

    /// The transport could not build an RPC client over the acquired stream
    #[error("RPC client init for node {node} failed: {reason}")]
    ClientInitFailed {
        /// Target node
        node: NodeId,
        /// Transport-supplied reason
        reason: Cow<'static, str>,
    },

    /// The call context was canceled before the reply arrived
    #[error("Call canceled")]
    Canceled,

    /// The call context deadline passed before the reply arrived
    #[error("Call deadline exceeded")]
    DeadlineExceeded,

    /// The stream or client broke while the call was in flight
    #[error("Transport error: {0}")]
    Transport(Cow<'static, str>),

    /// The peer's method returned an application-level error
    #[error("Remote method {method} failed: {message}")]
    Remote {
        /// Method name as invoked
        method: Cow<'static, str>,
        /// Error text reported by the peer
        message: Cow<'static, str>,
    },

    /// Request or reply payload could not be encoded/decoded
    #[error("Codec error: {0}")]
    Codec(Cow<'static, str>),

    // ============ Resolution Errors ============
    /// Local store has no entry for the node
    #[error("Unknown node identity: {0}")]
    UnknownIdentity(NodeId),

    /// Fallback resolution is impossible because no anchors are configured
    #[error("No anchor node available for resolution")]
    NoAnchorAvailable,

    /// Every anchor was tried and failed
    #[error("All {attempted} anchor(s) failed, last error: {last}")]
    AllAnchorsFailed {
        /// Number of anchors tried
        attempted: usize,
        /// Error from the last anchor tried
        #[source]
        last: Box<RpcError>,
    },

    /// A record was returned for a different node than the one requested
    #[error("Identity mismatch: expected {expected}, got {actual}")]
    IdentityMismatch {
        /// Requested node
        expected: NodeId,
        /// Node carried by the record
        actual: NodeId,
    },

    /// Local store failed for a reason other than a missing entry
    #[error("Store error: {0}")]
    Store(Cow<'static, str>),

    // ============ Configuration Errors ============
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),
}

impl RpcError {
    /// Returns true if this error is transient and may succeed on retry
    ///
    /// An exhausted anchor set is transient when the last anchor failed
    /// transiently.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            RpcError::DialFailed { .. } | RpcError::Transport(_) | RpcError::DeadlineExceeded => {
                true
            }
            RpcError::AllAnchorsFailed { last, .. } => last.is_transient(),
            _ => false,
        }
    }

    /// Returns true if this error is permanent and will not succeed on retry
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            RpcError::NoAnchorAvailable
                | RpcError::InvalidConfig(_)
                | RpcError::Codec(_)
                | RpcError::IdentityMismatch { .. }
        )
    }

    /// Returns true if the caller's context stopped the call
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, RpcError::Canceled | RpcError::DeadlineExceeded)
    }

    /// Returns true if this error should trigger a retry with backoff
    ///
    /// Deadlines are transient but belong to the caller, so they never
    /// trigger an automatic retry.
    #[must_use]
    pub fn should_retry(&self) -> bool {
        self.is_transient() && !self.is_cancellation()
    }

    /// Create a transport error with static context (zero allocation)
    #[must_use]
    pub const fn transport(context: &'static str) -> Self {
        RpcError::Transport(Cow::Borrowed(context))
    }

    /// Create a codec error with static context (zero allocation)
    #[must_use]
    pub const fn codec(context: &'static str) -> Self {
        RpcError::Codec(Cow::Borrowed(context))
    }

    /// Create a store error with static context (zero allocation)
    #[must_use]
    pub const fn store(context: &'static str) -> Self {
        RpcError::Store(Cow::Borrowed(context))
    }

    /// Create an invalid configuration error with static context (zero allocation)
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        RpcError::InvalidConfig(Cow::Borrowed(context))
    }

    /// Create a remote method error
    #[must_use]
    pub fn remote(method: impl Into<String>, message: impl Into<String>) -> Self {
        RpcError::Remote {
            method: Cow::Owned(method.into()),
            message: Cow::Owned(message.into()),
        }
    }
}

impl From<bincode::Error> for RpcError {
    fn from(err: bincode::Error) -> Self {
        RpcError::Codec(Cow::Owned(err.to_string()))
    }
}

/// Result type for call and resolution operations
pub type Result<T> = std::result::Result<T, RpcError>;
