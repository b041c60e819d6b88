use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;

use orchid_core::{CheckpointMeta, ConversationState, OrchidError, SessionStore};

/// In-memory session store keeping the full revision list per session.
/// Dev and test backend; production backends sit behind the same trait.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    inner: Arc<RwLock<HashMap<String, Vec<ConversationState>>>>,
}

impl MemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for MemorySessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, OrchidError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| OrchidError::Persistence("lock poisoned".into()))?;
        Ok(guard
            .get(session_id)
            .and_then(|revisions| revisions.last().cloned()))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), OrchidError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OrchidError::Persistence("lock poisoned".into()))?;
        guard
            .entry(state.session_id.clone())
            .or_default()
            .push(state.clone());
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, OrchidError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| OrchidError::Persistence("lock poisoned".into()))?;
        Ok(guard.contains_key(session_id))
    }

    async fn delete(&self, session_id: &str) -> Result<bool, OrchidError> {
        let mut guard = self
            .inner
            .write()
            .map_err(|_| OrchidError::Persistence("lock poisoned".into()))?;
        Ok(guard.remove(session_id).is_some())
    }

    async fn history(&self, session_id: &str) -> Result<Vec<CheckpointMeta>, OrchidError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| OrchidError::Persistence("lock poisoned".into()))?;
        Ok(guard
            .get(session_id)
            .map(|revisions| {
                revisions
                    .iter()
                    .enumerate()
                    .map(|(index, state)| CheckpointMeta {
                        seq: index as u64 + 1,
                        created_at: state.last_updated.to_rfc3339(),
                    })
                    .collect()
            })
            .unwrap_or_default())
    }
}
