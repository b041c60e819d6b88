use async_trait::async_trait;

use crate::{ConversationState, OrchidError};

#[derive(Clone, Debug, PartialEq)]
pub struct CheckpointMeta {
    pub seq: u64,
    pub created_at: String,
}

/// Session persistence capability.
///
/// `load` returns the last successfully saved state (the checkpoint), which
/// the dispatcher's caller uses to recover a session after a mid-turn
/// failure instead of starting over.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, OrchidError>;
    async fn save(&self, state: &ConversationState) -> Result<(), OrchidError>;
    async fn exists(&self, session_id: &str) -> Result<bool, OrchidError>;
    async fn delete(&self, session_id: &str) -> Result<bool, OrchidError>;
    async fn history(&self, session_id: &str) -> Result<Vec<CheckpointMeta>, OrchidError>;
}
