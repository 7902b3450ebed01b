//! In-process network
//!
//! [`MemoryNetwork`] is both a [`ConnectionPool`] and an [`RpcTransport`].
//! Every registered peer runs a [`MemoryService`] behind an in-memory duplex
//! stream. Requests and replies travel as bincode frames, so a call goes
//! through the same encode, send, receive and decode steps a socket-backed
//! transport would.
//!
//! The network records every dial, served request and lifecycle transition,
//! which makes release ordering and exactly-once teardown observable.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use wayfind_core::{FindNode, FindNodeResponse, NodeCapabilities, NodeId, NodeRecord};
//! use wayfind_rpc::memory::{MemoryNetwork, MemoryService};
//!
//! let network = Arc::new(MemoryNetwork::new());
//! network.add_peer(
//!     NodeId::from_bytes([1; 32]),
//!     MemoryService::new().handle::<FindNode, _>(|req| {
//!         Ok(FindNodeResponse {
//!             node: NodeRecord::with_id(
//!                 req.target,
//!                 "10.0.0.5:4661",
//!                 [0; 32],
//!                 NodeCapabilities::default(),
//!             ),
//!         })
//!     }),
//! );
//! assert_eq!(network.stats().dials, 0);
//! ```

use crate::pool::{ConnectionPool, PoolError, PooledStream, SessionMode, SharedStream};
use crate::transport::{Completion, RpcClient, RpcTransport, TransportError, TransportResult};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::HashMap;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use wayfind_core::{NodeId, Result, RpcError, RpcMethod, codec};

type Handler = Arc<dyn Fn(Vec<u8>) -> Result<Vec<u8>> + Send + Sync>;

/// Request frame on the wire
#[derive(Serialize, Deserialize)]
struct RequestFrame {
    method: String,
    body: Vec<u8>,
}

/// Reply frame on the wire; errors carry the remote message only
#[derive(Serialize, Deserialize)]
struct ReplyFrame {
    outcome: std::result::Result<Vec<u8>, String>,
}

/// Method table and behavior of one in-process peer
#[derive(Clone, Default)]
pub struct MemoryService {
    handlers: HashMap<String, Handler>,
    latency: Duration,
    hanging: bool,
}

impl MemoryService {
    /// Create a service with no methods
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a typed handler for method `M`
    ///
    /// Handler errors reach the caller as [`RpcError::Remote`]; the message
    /// of a `Remote` error is passed through verbatim.
    #[must_use]
    pub fn handle<M, F>(mut self, handler: F) -> Self
    where
        M: RpcMethod + 'static,
        F: Fn(M::Request) -> Result<M::Response> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(move |body: Vec<u8>| {
            let request = codec::decode::<M::Request>(&body)?;
            let response = handler(request)?;
            codec::encode(&response)
        });
        self.handlers.insert(M::NAME.to_owned(), handler);
        self
    }

    /// Delay every reply by `latency`
    #[must_use]
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    /// Accept requests but never reply
    #[must_use]
    pub fn hanging(mut self) -> Self {
        self.hanging = true;
        self
    }

    fn dispatch(&self, method: &str, body: Vec<u8>) -> Result<Vec<u8>> {
        match self.handlers.get(method) {
            Some(handler) => handler(body),
            None => Err(RpcError::remote(method, format!("unknown method {method}"))),
        }
    }
}

impl fmt::Debug for MemoryService {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut methods: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        methods.sort_unstable();
        f.debug_struct("MemoryService")
            .field("methods", &methods)
            .field("latency", &self.latency)
            .field("hanging", &self.hanging)
            .finish()
    }
}

#[derive(Debug, Clone)]
enum Peer {
    Serving(Arc<MemoryService>),
    Unreachable,
    RefusesClients,
    Disconnects,
}

/// Stream and client lifecycle transitions, in the order they happened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// A stream to the peer was handed out
    StreamAcquired(NodeId),
    /// A stream to the peer went back to the pool
    StreamReleased(NodeId),
    /// An RPC client was built over a stream to the peer
    ClientOpened(NodeId),
    /// An RPC client to the peer was closed
    ClientClosed(NodeId),
}

/// Point-in-time network counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NetworkStats {
    /// Acquire attempts, successful or not
    pub dials: u64,
    /// Streams handed out
    pub streams_acquired: u64,
    /// Streams released (first release of each stream)
    pub streams_released: u64,
    /// Every `release()` call, including repeats
    pub release_calls: u64,
    /// RPC clients built
    pub clients_opened: u64,
    /// RPC clients closed (first close of each client)
    pub clients_closed: u64,
    /// Every `close()` call, including repeats
    pub close_calls: u64,
    /// Requests received by peers
    pub requests_served: u64,
    /// Requests peers finished handling
    pub requests_completed: u64,
}

#[derive(Debug, Default)]
struct Counters {
    dials: AtomicU64,
    streams_acquired: AtomicU64,
    streams_released: AtomicU64,
    release_calls: AtomicU64,
    clients_opened: AtomicU64,
    clients_closed: AtomicU64,
    close_calls: AtomicU64,
    requests_served: AtomicU64,
    requests_completed: AtomicU64,
}

#[derive(Debug, Default)]
struct Recorder {
    counters: Counters,
    events: Mutex<Vec<LifecycleEvent>>,
    dials: Mutex<Vec<(NodeId, SessionMode)>>,
    served: Mutex<Vec<(NodeId, String)>>,
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::SeqCst);
}

fn push<T>(log: &Mutex<Vec<T>>, item: T) {
    log.lock().unwrap_or_else(PoisonError::into_inner).push(item);
}

fn snapshot<T: Clone>(log: &Mutex<Vec<T>>) -> Vec<T> {
    log.lock().unwrap_or_else(PoisonError::into_inner).clone()
}

/// In-process peers reachable by identity
#[derive(Debug, Default)]
pub struct MemoryNetwork {
    peers: DashMap<NodeId, Peer>,
    recorder: Arc<Recorder>,
}

impl MemoryNetwork {
    /// Create an empty network
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a serving peer
    pub fn add_peer(&self, id: NodeId, service: MemoryService) {
        self.peers.insert(id, Peer::Serving(Arc::new(service)));
    }

    /// Register a peer whose dials always fail
    pub fn add_unreachable(&self, id: NodeId) {
        self.peers.insert(id, Peer::Unreachable);
    }

    /// Register a peer that accepts streams but refuses RPC clients
    pub fn add_refusing(&self, id: NodeId) {
        self.peers.insert(id, Peer::RefusesClients);
    }

    /// Register a peer that accepts streams and clients, then drops the
    /// session before reading any request
    pub fn add_disconnecting(&self, id: NodeId) {
        self.peers.insert(id, Peer::Disconnects);
    }

    /// Remove a peer; later dials to it fail
    pub fn remove_peer(&self, id: &NodeId) -> bool {
        self.peers.remove(id).is_some()
    }

    /// Current counters
    #[must_use]
    pub fn stats(&self) -> NetworkStats {
        let c = &self.recorder.counters;
        let load = |counter: &AtomicU64| counter.load(Ordering::SeqCst);
        NetworkStats {
            dials: load(&c.dials),
            streams_acquired: load(&c.streams_acquired),
            streams_released: load(&c.streams_released),
            release_calls: load(&c.release_calls),
            clients_opened: load(&c.clients_opened),
            clients_closed: load(&c.clients_closed),
            close_calls: load(&c.close_calls),
            requests_served: load(&c.requests_served),
            requests_completed: load(&c.requests_completed),
        }
    }

    /// Lifecycle transitions so far
    #[must_use]
    pub fn events(&self) -> Vec<LifecycleEvent> {
        snapshot(&self.recorder.events)
    }

    /// Every acquire attempt as `(peer, mode)`, in order
    #[must_use]
    pub fn dials(&self) -> Vec<(NodeId, SessionMode)> {
        snapshot(&self.recorder.dials)
    }

    /// Every request a peer received as `(peer, method)`, in order
    #[must_use]
    pub fn served(&self) -> Vec<(NodeId, String)> {
        snapshot(&self.recorder.served)
    }
}

#[async_trait]
impl ConnectionPool for MemoryNetwork {
    async fn acquire(
        &self,
        node: &NodeId,
        mode: SessionMode,
    ) -> std::result::Result<SharedStream, PoolError> {
        bump(&self.recorder.counters.dials);
        push(&self.recorder.dials, (*node, mode));

        let peer = self.peers.get(node).map(|entry| entry.value().clone());
        let service = match peer {
            None => {
                return Err(PoolError::Unreachable(Cow::Owned(format!(
                    "no route to {}",
                    node.short()
                ))));
            }
            Some(Peer::Unreachable) => {
                return Err(PoolError::Unreachable(Cow::Borrowed("peer is down")));
            }
            Some(Peer::Serving(service)) => Some(service),
            Some(Peer::RefusesClients | Peer::Disconnects) => None,
        };

        let (to_peer, peer_inbox) = mpsc::unbounded_channel();
        let (peer_outbox, from_peer) = mpsc::unbounded_channel();
        if let Some(service) = service {
            tokio::spawn(serve(
                *node,
                service,
                peer_inbox,
                peer_outbox,
                Arc::clone(&self.recorder),
            ));
        }

        bump(&self.recorder.counters.streams_acquired);
        push(&self.recorder.events, LifecycleEvent::StreamAcquired(*node));

        Ok(Arc::new(MemoryStream {
            peer: *node,
            mode,
            outbound: to_peer,
            inbound: tokio::sync::Mutex::new(from_peer),
            released: AtomicBool::new(false),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

#[async_trait]
impl RpcTransport for MemoryNetwork {
    async fn wrap(&self, stream: SharedStream) -> TransportResult<Box<dyn RpcClient>> {
        let peer = stream.peer();
        if stream.is_released() {
            return Err(TransportError::Closed);
        }
        if matches!(
            self.peers.get(&peer).as_deref(),
            Some(Peer::RefusesClients)
        ) {
            return Err(TransportError::Handshake(Cow::Borrowed(
                "peer refused the RPC client",
            )));
        }

        bump(&self.recorder.counters.clients_opened);
        push(&self.recorder.events, LifecycleEvent::ClientOpened(peer));

        Ok(Box::new(MemoryClient {
            stream,
            call_lock: Arc::new(tokio::sync::Mutex::new(())),
            closed: AtomicBool::new(false),
            recorder: Arc::clone(&self.recorder),
        }))
    }
}

/// Peer side of a stream: answer frames until the caller side goes away
async fn serve(
    node: NodeId,
    service: Arc<MemoryService>,
    mut inbox: mpsc::UnboundedReceiver<Vec<u8>>,
    outbox: mpsc::UnboundedSender<Vec<u8>>,
    recorder: Arc<Recorder>,
) {
    while let Some(frame) = inbox.recv().await {
        let request: RequestFrame = match codec::decode(&frame) {
            Ok(request) => request,
            Err(e) => {
                tracing::warn!("Dropping malformed frame for {}: {}", node.short(), e);
                continue;
            }
        };

        bump(&recorder.counters.requests_served);
        push(&recorder.served, (node, request.method.clone()));

        if service.hanging {
            continue;
        }
        if !service.latency.is_zero() {
            tokio::time::sleep(service.latency).await;
        }

        let outcome = service
            .dispatch(&request.method, request.body)
            .map_err(|e| match e {
                RpcError::Remote { message, .. } => message.into_owned(),
                other => other.to_string(),
            });
        bump(&recorder.counters.requests_completed);

        let reply = match codec::encode(&ReplyFrame { outcome }) {
            Ok(reply) => reply,
            Err(e) => {
                tracing::warn!("Failed to encode reply from {}: {}", node.short(), e);
                continue;
            }
        };
        if outbox.send(reply).is_err() {
            break;
        }
    }
}

#[derive(Debug)]
struct MemoryStream {
    peer: NodeId,
    mode: SessionMode,
    outbound: mpsc::UnboundedSender<Vec<u8>>,
    inbound: tokio::sync::Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    released: AtomicBool,
    recorder: Arc<Recorder>,
}

#[async_trait]
impl PooledStream for MemoryStream {
    fn peer(&self) -> NodeId {
        self.peer
    }

    fn mode(&self) -> SessionMode {
        self.mode
    }

    async fn send(&self, frame: Vec<u8>) -> io::Result<()> {
        self.outbound
            .send(frame)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "peer closed the stream"))
    }

    async fn recv(&self) -> io::Result<Vec<u8>> {
        self.inbound
            .lock()
            .await
            .recv()
            .await
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "peer closed the stream"))
    }

    fn release(&self) {
        bump(&self.recorder.counters.release_calls);
        if !self.released.swap(true, Ordering::SeqCst) {
            bump(&self.recorder.counters.streams_released);
            push(&self.recorder.events, LifecycleEvent::StreamReleased(self.peer));
        }
    }

    fn is_released(&self) -> bool {
        self.released.load(Ordering::SeqCst)
    }
}

/// RPC client over a memory stream
///
/// Calls on one client are serialized: each holds the stream for one
/// request/reply exchange.
struct MemoryClient {
    stream: SharedStream,
    call_lock: Arc<tokio::sync::Mutex<()>>,
    closed: AtomicBool,
    recorder: Arc<Recorder>,
}

impl RpcClient for MemoryClient {
    fn invoke(&self, method: &str, request: Vec<u8>) -> Completion {
        let (tx, rx) = oneshot::channel();
        if self.closed.load(Ordering::SeqCst) {
            let _ = tx.send(Err(RpcError::transport("RPC client is closed")));
            return rx;
        }

        let stream = Arc::clone(&self.stream);
        let call_lock = Arc::clone(&self.call_lock);
        let method = method.to_owned();
        tokio::spawn(async move {
            let _exchange = call_lock.lock().await;
            let outcome = round_trip(stream.as_ref(), &method, request).await;
            let _ = tx.send(outcome);
        });
        rx
    }

    fn close(&self) {
        bump(&self.recorder.counters.close_calls);
        if !self.closed.swap(true, Ordering::SeqCst) {
            bump(&self.recorder.counters.clients_closed);
            push(
                &self.recorder.events,
                LifecycleEvent::ClientClosed(self.stream.peer()),
            );
        }
    }
}

async fn round_trip(stream: &dyn PooledStream, method: &str, body: Vec<u8>) -> Result<Vec<u8>> {
    let frame = codec::encode(&RequestFrame {
        method: method.to_owned(),
        body,
    })?;
    stream
        .send(frame)
        .await
        .map_err(|e| RpcError::Transport(Cow::Owned(e.to_string())))?;
    let reply = stream
        .recv()
        .await
        .map_err(|e| RpcError::Transport(Cow::Owned(e.to_string())))?;
    let reply: ReplyFrame = codec::decode(&reply)?;
    reply.outcome.map_err(|message| RpcError::remote(method, message))
}
