//! Per-activation correlation ids.

use std::time::{SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

/// Pick the correlation id for an activation.
///
/// An RPC request id is propagated unchanged so traces line up across hops.
/// Otherwise the id is `<unix millis>-<operation checksum>-<random>`; the
/// 64-bit random part keeps ids apart when the clock and operation repeat.
pub fn derive_correlation_id(rpc_request_id: Option<&str>, operation: &str) -> String {
    match rpc_request_id {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => synthesize(operation),
    }
}

fn synthesize(operation: &str) -> String {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or_default();
    let digest = Sha256::digest(operation.as_bytes());
    let checksum = hex::encode(&digest[..4]);
    let nonce: u64 = rand::random();
    format!("{millis}-{checksum}-{nonce:016x}")
}
