use std::collections::hash_map::DefaultHasher;
use std::fs::{self, File, OpenOptions};
use std::hash::{Hash, Hasher};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use orchid_core::{CheckpointMeta, ConversationState, OrchidError, SessionStore};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckpointRecord {
    pub seq: u64,
    pub created_at: String,
    pub state: ConversationState,
}

/// File-backed session store: one JSONL file per session, each line an
/// append-only checkpoint record. `load` returns the last line, which is
/// the recovery point after a mid-turn failure.
#[derive(Clone, Debug)]
pub struct FileSessionStore {
    base_dir: PathBuf,
}

impl FileSessionStore {
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Self {
        Self {
            base_dir: base_dir.as_ref().to_path_buf(),
        }
    }

    fn sanitize_session_id(session_id: &str) -> String {
        let mut out = String::with_capacity(session_id.len());
        for ch in session_id.chars() {
            match ch {
                '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => out.push('_'),
                c if c.is_control() => {}
                c => out.push(c),
            }
        }
        let trimmed = out.trim_matches(|c: char| c == '.' || c.is_whitespace() || c == '_');
        if trimmed.is_empty() {
            let mut hasher = DefaultHasher::new();
            session_id.hash(&mut hasher);
            return format!("session-{:08x}", hasher.finish());
        }
        trimmed.to_string()
    }

    fn session_path(&self, session_id: &str) -> PathBuf {
        let filename = format!("{}.jsonl", Self::sanitize_session_id(session_id));
        self.base_dir.join(filename)
    }

    fn read_records(&self, session_id: &str) -> Result<Vec<CheckpointRecord>, OrchidError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(Vec::new());
        }
        let file = File::open(&path).map_err(|err| OrchidError::Persistence(err.to_string()))?;
        let reader = BufReader::new(file);
        let mut records = Vec::new();
        for line in reader.lines() {
            let line = line.map_err(|err| OrchidError::Persistence(err.to_string()))?;
            if line.trim().is_empty() {
                continue;
            }
            records.push(
                serde_json::from_str(&line)
                    .map_err(|err| OrchidError::Persistence(err.to_string()))?,
            );
        }
        Ok(records)
    }
}

#[async_trait]
impl SessionStore for FileSessionStore {
    async fn load(&self, session_id: &str) -> Result<Option<ConversationState>, OrchidError> {
        Ok(self
            .read_records(session_id)?
            .pop()
            .map(|record| record.state))
    }

    async fn save(&self, state: &ConversationState) -> Result<(), OrchidError> {
        fs::create_dir_all(&self.base_dir)
            .map_err(|err| OrchidError::Persistence(err.to_string()))?;

        let path = self.session_path(&state.session_id);
        let seq = self
            .read_records(&state.session_id)?
            .last()
            .map(|record| record.seq + 1)
            .unwrap_or(1);
        let record = CheckpointRecord {
            seq,
            created_at: state.last_updated.to_rfc3339(),
            state: state.clone(),
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|err| OrchidError::Persistence(err.to_string()))?;
        let line = serde_json::to_string(&record)
            .map_err(|err| OrchidError::Persistence(err.to_string()))?;
        file.write_all(format!("{line}\n").as_bytes())
            .map_err(|err| OrchidError::Persistence(err.to_string()))?;
        Ok(())
    }

    async fn exists(&self, session_id: &str) -> Result<bool, OrchidError> {
        Ok(self.session_path(session_id).exists())
    }

    async fn delete(&self, session_id: &str) -> Result<bool, OrchidError> {
        let path = self.session_path(session_id);
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(&path).map_err(|err| OrchidError::Persistence(err.to_string()))?;
        Ok(true)
    }

    async fn history(&self, session_id: &str) -> Result<Vec<CheckpointMeta>, OrchidError> {
        Ok(self
            .read_records(session_id)?
            .into_iter()
            .map(|record| CheckpointMeta {
                seq: record.seq,
                created_at: record.created_at,
            })
            .collect())
    }
}
