//! Caller-supplied cancellation for remote calls
//!
//! A [`CallContext`] combines an optional deadline with an optional
//! [`CancellationToken`]. The dispatcher never originates its own timeout:
//! whatever the caller puts in the context is the only thing that can stop a
//! call early. A [`CallContext::background`] context never fires.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use tokio_util::sync::CancellationToken;
//! use wayfind_core::CallContext;
//!
//! let token = CancellationToken::new();
//! let ctx = CallContext::with_timeout(Duration::from_secs(5)).and_token(token.clone());
//!
//! token.cancel();
//! assert!(ctx.check().is_err());
//! ```

use crate::error::{Result, RpcError};
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Deadline and/or cancel token bounding a call
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    token: Option<CancellationToken>,
}

impl CallContext {
    /// A context that never fires
    #[must_use]
    pub fn background() -> Self {
        Self::default()
    }

    /// A context that expires `timeout` from now
    ///
    /// A timeout too large to represent as an instant never fires.
    #[must_use]
    pub fn with_timeout(timeout: Duration) -> Self {
        Instant::now()
            .checked_add(timeout)
            .map_or_else(Self::background, Self::with_deadline)
    }

    /// A context that expires at `deadline`
    #[must_use]
    pub fn with_deadline(deadline: Instant) -> Self {
        Self {
            deadline: Some(deadline),
            token: None,
        }
    }

    /// A context canceled through `token`
    #[must_use]
    pub fn with_token(token: CancellationToken) -> Self {
        Self {
            deadline: None,
            token: Some(token),
        }
    }

    /// Add (or replace) the cancel token, keeping the deadline
    #[must_use]
    pub fn and_token(mut self, token: CancellationToken) -> Self {
        self.token = Some(token);
        self
    }

    /// Non-blocking check of the context
    ///
    /// An explicit cancel is reported ahead of an expired deadline.
    ///
    /// # Errors
    ///
    /// Returns [`RpcError::Canceled`] or [`RpcError::DeadlineExceeded`] if the
    /// context has already fired.
    pub fn check(&self) -> Result<()> {
        if self.token.as_ref().is_some_and(CancellationToken::is_cancelled) {
            return Err(RpcError::Canceled);
        }
        if self.deadline.is_some_and(|d| Instant::now() >= d) {
            return Err(RpcError::DeadlineExceeded);
        }
        Ok(())
    }

    /// Wait until the context fires and return the reason
    ///
    /// Pending forever for a background context.
    pub async fn done(&self) -> RpcError {
        match (&self.token, self.deadline) {
            (None, None) => std::future::pending().await,
            (Some(token), None) => {
                token.cancelled().await;
                RpcError::Canceled
            }
            (None, Some(deadline)) => {
                tokio::time::sleep_until(deadline).await;
                RpcError::DeadlineExceeded
            }
            (Some(token), Some(deadline)) => {
                tokio::select! {
                    biased;
                    () = token.cancelled() => RpcError::Canceled,
                    () = tokio::time::sleep_until(deadline) => RpcError::DeadlineExceeded,
                }
            }
        }
    }
}
