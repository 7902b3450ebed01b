//! Anchor announce
//!
//! A node tells a trusted anchor about itself by sending `DHT.Ping` with its
//! own record. The call always goes over an ephemeral session: the anchor
//! may not be able to verify the node yet. One attempt, one anchor; retry
//! and anchor selection belong to the caller.

use wayfind_core::{
    CallContext, NodeId, NodeRecord, Ping, PingRequest, PingResponse, Result, RpcError,
    RpcMethod, codec,
};
use wayfind_rpc::{Dispatcher, SessionMode};

/// Announce `self_record` to `anchor`, waiting as long as it takes
///
/// # Errors
///
/// See [`announce_with_context`].
pub async fn announce(
    dispatcher: &Dispatcher,
    self_record: &NodeRecord,
    anchor: &NodeId,
) -> Result<()> {
    announce_with_context(dispatcher, &CallContext::background(), self_record, anchor).await
}

/// Announce `self_record` to `anchor`
///
/// # Errors
///
/// Dispatcher errors are returned unchanged. An anchor that answers with
/// `accepted == false` yields [`RpcError::Remote`] for `DHT.Ping`.
pub async fn announce_with_context(
    dispatcher: &Dispatcher,
    ctx: &CallContext,
    self_record: &NodeRecord,
    anchor: &NodeId,
) -> Result<()> {
    let request = codec::encode(&PingRequest {
        node: self_record.clone(),
    })?;

    let reply = dispatcher
        .invoke_with_mode(ctx, anchor, Ping::NAME, SessionMode::Ephemeral, request)
        .await?;
    let reply: PingResponse = codec::decode(&reply)?;

    if !reply.accepted {
        tracing::warn!(
            "Anchor {} rejected announce of {}",
            anchor.short(),
            self_record.id.short()
        );
        return Err(RpcError::remote(Ping::NAME, "announce rejected by anchor"));
    }

    tracing::debug!(
        "Announced {} ({}) to anchor {}",
        self_record.id.short(),
        self_record.addr,
        anchor.short()
    );
    Ok(())
}
