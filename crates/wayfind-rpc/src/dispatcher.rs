//! Cancellable remote call dispatch
//!
//! One call is one pass through:
//!
//! ```text
//! acquire(node, mode) ──▶ wrap(stream) ──▶ invoke(method, body)
//!                                              │
//!                         ┌────────────────────┴──────────────┐
//!                         ▼                                   ▼
//!                  completion fires                   context fires
//!                  (reply or error)             (Canceled / DeadlineExceeded)
//!                         └──────────────┬────────────────────┘
//!                                        ▼
//!                      release stream, then close client
//! ```
//!
//! The stream is released and the client closed exactly once per acquired
//! stream, on every exit path, including a dropped call future. A canceled
//! call is abandoned, not aborted: the transport may still finish the
//! invocation in the background, and its completion goes unobserved.

use crate::pool::{ConnectionPool, SessionMode, SharedStream};
use crate::transport::{RpcClient, RpcTransport};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use wayfind_core::{CallContext, DispatcherConfig, NodeId, Result, RpcError, RpcMethod, codec};

/// Owns the per-call resources and tears them down on drop
///
/// Release order is fixed: the stream goes back to the pool first, then the
/// client (if one was built) is closed.
struct CallGuard {
    stream: SharedStream,
    client: Option<Box<dyn RpcClient>>,
}

impl CallGuard {
    fn new(stream: SharedStream) -> Self {
        Self {
            stream,
            client: None,
        }
    }

    fn stream(&self) -> SharedStream {
        Arc::clone(&self.stream)
    }

    fn attach(&mut self, client: Box<dyn RpcClient>) -> &dyn RpcClient {
        &**self.client.insert(client)
    }
}

impl Drop for CallGuard {
    fn drop(&mut self) {
        self.stream.release();
        if let Some(client) = self.client.take() {
            client.close();
        }
    }
}

/// Issues remote calls to peers identified by [`NodeId`]
///
/// Holds no per-call state; share it behind an `Arc` and call it
/// concurrently.
pub struct Dispatcher {
    pool: Arc<dyn ConnectionPool>,
    transport: Arc<dyn RpcTransport>,
    config: DispatcherConfig,
}

impl Dispatcher {
    /// Create a dispatcher over a connection pool and an RPC transport
    #[must_use]
    pub fn new(
        pool: Arc<dyn ConnectionPool>,
        transport: Arc<dyn RpcTransport>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            pool,
            transport,
            config,
        }
    }

    /// Session mode a call to `method` is dialed with
    ///
    /// Liveness methods (`DHT.Ping` by default) use ephemeral sessions so
    /// they work before the peer can be mutually verified.
    #[must_use]
    pub fn session_mode_for(&self, method: &str) -> SessionMode {
        if self.config.is_ephemeral(method) {
            SessionMode::Ephemeral
        } else {
            SessionMode::Authenticated
        }
    }

    /// Invoke `method` on `node` with an encoded request body
    ///
    /// # Errors
    ///
    /// - [`RpcError::DialFailed`] if no stream could be acquired
    /// - [`RpcError::ClientInitFailed`] if the stream could not be wrapped
    /// - [`RpcError::Canceled`] / [`RpcError::DeadlineExceeded`] if `ctx`
    ///   fired before the reply
    /// - whatever error the invocation itself completed with
    pub async fn invoke(
        &self,
        ctx: &CallContext,
        node: &NodeId,
        method: &str,
        request: Vec<u8>,
    ) -> Result<Vec<u8>> {
        let mode = self.session_mode_for(method);
        self.invoke_with_mode(ctx, node, method, mode, request).await
    }

    /// Invoke `method` on `node` over a session of the given mode
    ///
    /// # Errors
    ///
    /// Same as [`Self::invoke`].
    pub async fn invoke_with_mode(
        &self,
        ctx: &CallContext,
        node: &NodeId,
        method: &str,
        mode: SessionMode,
        request: Vec<u8>,
    ) -> Result<Vec<u8>> {
        tracing::trace!("Dialing {} for {} ({} session)", node.short(), method, mode);

        let stream = self.pool.acquire(node, mode).await.map_err(|e| {
            tracing::error!("Failed to acquire stream to {}: {}", node.short(), e);
            RpcError::DialFailed {
                node: *node,
                reason: e.to_string().into(),
            }
        })?;

        let mut guard = CallGuard::new(stream);

        let client = self.transport.wrap(guard.stream()).await.map_err(|e| {
            tracing::error!("Failed to open RPC client to {}: {}", node.short(), e);
            RpcError::ClientInitFailed {
                node: *node,
                reason: e.to_string().into(),
            }
        })?;

        let completion = guard.attach(client).invoke(method, request);

        tokio::select! {
            biased;
            reason = ctx.done() => {
                tracing::debug!("Abandoning {} to {}: {}", method, node.short(), reason);
                Err(reason)
            }
            outcome = completion => match outcome {
                Ok(Ok(reply)) => {
                    tracing::trace!(
                        "{} to {} completed ({} bytes)",
                        method,
                        node.short(),
                        reply.len()
                    );
                    Ok(reply)
                }
                Ok(Err(e)) => {
                    tracing::debug!("{} to {} failed: {}", method, node.short(), e);
                    Err(e)
                }
                Err(_) => Err(RpcError::transport("RPC client dropped the call without a reply")),
            },
        }
    }

    /// Call `method` on `node` with no cancellation
    ///
    /// # Errors
    ///
    /// Same as [`Self::invoke`], plus [`RpcError::Codec`] for payloads that
    /// fail to encode or decode.
    pub async fn call_method<Req, Resp>(
        &self,
        node: &NodeId,
        method: &str,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        self.call_method_with_cancellation(&CallContext::background(), node, method, request)
            .await
    }

    /// Call `method` on `node`, giving up when `ctx` fires
    ///
    /// # Errors
    ///
    /// Same as [`Self::call_method`].
    pub async fn call_method_with_cancellation<Req, Resp>(
        &self,
        ctx: &CallContext,
        node: &NodeId,
        method: &str,
        request: &Req,
    ) -> Result<Resp>
    where
        Req: Serialize + Sync + ?Sized,
        Resp: DeserializeOwned,
    {
        let body = codec::encode(request)?;
        let reply = self.invoke(ctx, node, method, body).await?;
        codec::decode(&reply)
    }

    /// Typed call of a known method
    ///
    /// # Errors
    ///
    /// Same as [`Self::call_method`].
    pub async fn call<M: RpcMethod>(
        &self,
        ctx: &CallContext,
        node: &NodeId,
        request: &M::Request,
    ) -> Result<M::Response> {
        self.call_method_with_cancellation(ctx, node, M::NAME, request)
            .await
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
