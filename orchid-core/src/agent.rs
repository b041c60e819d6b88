use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::{AgentKind, ConversationState, OrchidError};

/// Per-adapter response caching policy. The dispatcher consults this
/// generically; no domain is ever special-cased.
#[derive(Clone, Debug, PartialEq)]
pub struct AgentCachePolicy {
    pub enabled: bool,
    pub ttl: Duration,
    pub namespace: String,
}

impl AgentCachePolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(3600),
            namespace: String::new(),
        }
    }

    pub fn enabled(namespace: impl Into<String>, ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl,
            namespace: namespace.into(),
        }
    }
}

impl Default for AgentCachePolicy {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Uniform contract for a domain handler. The engine only ever sees this
/// seam; a handler's internal pipeline (RAG, search, slot collection) is
/// its own business.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    fn kind(&self) -> AgentKind;

    /// Run the handler's pipeline for the current turn. The returned state
    /// carries the response text and may set `pending_handoff` or
    /// `needs_user_input`.
    async fn process(&self, state: ConversationState)
        -> Result<ConversationState, OrchidError>;

    /// Extract domain slots from raw text without running the full
    /// pipeline. Used by the supervisor and the decision engine.
    async fn extract_slots(&self, text: &str, context: &Value)
        -> Result<Value, OrchidError>;

    fn cache_policy(&self) -> AgentCachePolicy {
        AgentCachePolicy::disabled()
    }
}
