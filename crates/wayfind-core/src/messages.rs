//! Typed RPC method descriptors and the DHT messages the core speaks.
//!
//! A method name selects the request and reply shapes at the call boundary:
//! each [`RpcMethod`] binds a wire name to its payload types so callers can
//! write `dispatcher.call::<FindNode>(..)` instead of pairing strings with
//! types by hand.

use crate::identity::{NodeId, NodeRecord};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// Method name of the anchor lookup
pub const DHT_FIND_NODE: &str = "DHT.FindNode";

/// Method name of the liveness/announce call
pub const DHT_PING: &str = "DHT.Ping";

/// A named remote procedure with fixed request and reply types
pub trait RpcMethod {
    /// Wire name of the method
    const NAME: &'static str;

    /// Request payload
    type Request: Serialize + DeserializeOwned + Send + Sync + 'static;

    /// Reply payload
    type Response: Serialize + DeserializeOwned + Send + Sync + 'static;
}

/// Ask an anchor for the record of `target`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindNodeRequest {
    /// Node being resolved
    pub target: NodeId,
}

/// Anchor reply carrying the resolved record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FindNodeResponse {
    /// Resolved record
    pub node: NodeRecord,
}

/// Announce the caller's own record to an anchor
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingRequest {
    /// Record of the announcing node
    pub node: NodeRecord,
}

/// Anchor acknowledgement of an announce
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PingResponse {
    /// Anchor that answered
    pub sender_id: NodeId,

    /// Whether the anchor accepted the announced record
    pub accepted: bool,
}

/// `DHT.FindNode`
#[derive(Debug, Clone, Copy)]
pub struct FindNode;

impl RpcMethod for FindNode {
    const NAME: &'static str = DHT_FIND_NODE;
    type Request = FindNodeRequest;
    type Response = FindNodeResponse;
}

/// `DHT.Ping`
#[derive(Debug, Clone, Copy)]
pub struct Ping;

impl RpcMethod for Ping {
    const NAME: &'static str = DHT_PING;
    type Request = PingRequest;
    type Response = PingResponse;
}
