//! Payload codec for request and reply bodies.
//!
//! Payloads travel as opaque byte vectors between the dispatcher and the RPC
//! client; these helpers are the only place they are (de)serialized.

use crate::error::Result;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// Serialize a payload to bytes
///
/// # Errors
///
/// Returns [`crate::RpcError::Codec`] if serialization fails.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
    Ok(bincode::serialize(value)?)
}

/// Deserialize a payload from bytes
///
/// # Errors
///
/// Returns [`crate::RpcError::Codec`] if the bytes are not a valid `T`.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    Ok(bincode::deserialize(bytes)?)
}
