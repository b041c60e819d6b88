use std::time::Duration;

use thiserror::Error;

use crate::decision::AgentKind;

#[derive(Debug, Error)]
pub enum OrchidError {
    #[error("decision unavailable: {0}")]
    DecisionUnavailable(String),
    #[error("adapter '{agent}' failed: {reason}")]
    AdapterFailure { agent: AgentKind, reason: String },
    #[error("persistence failed: {0}")]
    Persistence(String),
    #[error("cache failed: {0}")]
    CacheFailed(String),
    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("missing node: {node}")]
    MissingNode { node: String },
    #[error("max steps exceeded: reached {reached}, limit {max}")]
    MaxStepsExceeded { max: usize, reached: usize },
    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("{0}")]
    Custom(String),
}
