use crate::global_state::GlobalState;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Bump on any change to the serialized shape; only round-trip
/// compatibility within one version is promised.
const PAYLOAD_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("payload serialization failed: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("payload version mismatch: found {found}, expected {expected}")]
    VersionMismatch { found: u32, expected: u32 },
}

#[derive(Serialize, Deserialize)]
struct Payload {
    version: u32,
    state: GlobalState,
}

/// Serialize the global state (names, symbols, files) into one opaque byte
/// stream.
pub fn serialize(gs: &GlobalState) -> Result<Vec<u8>, PayloadError> {
    gs.sanity_check();
    let payload = Payload {
        version: PAYLOAD_VERSION,
        state: gs.clone(),
    };
    Ok(serde_json::to_vec(&payload)?)
}

/// Restore a global state from a snapshot. The restored state gets a fresh
/// identity: no parent fingerprint, all tables frozen.
pub fn deserialize(bytes: &[u8]) -> Result<GlobalState, PayloadError> {
    let payload: Payload = serde_json::from_slice(bytes)?;
    if payload.version != PAYLOAD_VERSION {
        return Err(PayloadError::VersionMismatch {
            found: payload.version,
            expected: PAYLOAD_VERSION,
        });
    }
    let mut gs = payload.state;
    gs.rebuild_indexes();
    gs.sanity_check();
    Ok(gs)
}
