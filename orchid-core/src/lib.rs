//! Shared vocabulary for the orchid routing engine: conversation state,
//! decision records, the error taxonomy, and the capability traits every
//! external collaborator implements.

mod agent;
mod cache;
mod decision;
mod error;
mod llm;
mod observer;
mod state;
mod store;

pub use agent::{AgentAdapter, AgentCachePolicy};
pub use cache::{agent_cache_key, decision_cache_key, DecisionCache};
pub use decision::{
    AgentDecision, AgentKind, ClarificationQuestion, CompletenessDecision, HandoffDecision,
    Intent, IntentDecision, MergeStrategy, NextAction, NextStepDecision, PendingHandoff,
    SupervisorPlan, SupervisorValidation,
};
pub use error::OrchidError;
pub use llm::{output_schema, parse_structured, LlmCaller, LlmReply, LlmRequest, ParseOutcome};
pub use observer::{NullObserver, TraceContext, TurnObserver};
pub use state::{ChatMessage, ConversationState, Role};
pub use store::{CheckpointMeta, SessionStore};
