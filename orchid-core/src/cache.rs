use std::fmt::Write as _;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::OrchidError;

/// Cache capability for routing decisions and agent responses. Backends
/// (in-memory, Redis, ...) are selected by configuration, never subclassed.
#[async_trait]
pub trait DecisionCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<Value>, OrchidError>;
    async fn set(&self, key: &str, value: Value, ttl: Duration) -> Result<(), OrchidError>;
    async fn delete(&self, key: &str) -> Result<(), OrchidError>;
    async fn exists(&self, key: &str) -> Result<bool, OrchidError>;
    async fn clear(&self) -> Result<(), OrchidError>;
}

/// Deterministic cache key for one routing judgment.
///
/// The key hashes the decision kind, the normalized user text, and the
/// name/value parts sorted by name, so keyword-style inputs produce the
/// same key in any call order.
///
/// The session id is deliberately excluded: identical-looking inputs from
/// different sessions share one entry. That is an accepted product
/// trade-off (throughput over per-user isolation); callers that need
/// per-session scoping can pass `("session", id)` as a part.
pub fn decision_cache_key(kind: &str, text: &str, parts: &[(&str, String)]) -> String {
    let normalized = text.trim().to_lowercase();
    let mut sorted: Vec<&(&str, String)> = parts.iter().collect();
    sorted.sort_by_key(|(name, _)| *name);

    let mut hasher = Sha256::new();
    hasher.update(kind.as_bytes());
    hasher.update(b"|");
    hasher.update(normalized.as_bytes());
    for (name, value) in sorted {
        hasher.update(b"|");
        hasher.update(name.as_bytes());
        hasher.update(b"=");
        hasher.update(value.as_bytes());
    }

    let digest = hasher.finalize();
    let mut hex = String::with_capacity(digest.len() * 2);
    for byte in digest {
        let _ = write!(hex, "{byte:02x}");
    }
    format!("router:{kind}:{hex}")
}

/// Cache key for a full agent response, namespaced by the adapter's
/// declared cache policy.
pub fn agent_cache_key(namespace: &str, query: &str, slots: &[(&str, String)]) -> String {
    let key = decision_cache_key(namespace, query, slots);
    key.replacen("router:", "agent:", 1)
}
