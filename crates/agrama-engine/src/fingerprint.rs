use sha2::{Digest, Sha256};

/// Hex-encoded SHA-256 over the canonical (key-sorted) JSON encoding of
/// `params`, stamped into every event record. `serde_json::Value`'s `Map` is a
/// `BTreeMap` under the hood (the default `serde_json` feature set, which
/// is what the workspace depends on — `preserve_order` is not enabled), so
/// `to_string` already emits keys in sorted order and two structurally
/// equal parameter objects fingerprint identically regardless of
/// construction order.
pub fn fingerprint(params: &serde_json::Value) -> String {
    let canonical = params.to_string();
    let mut hasher = Sha256::new();
    hasher.update(canonical.as_bytes());
    hex::encode(hasher.finalize())
}
