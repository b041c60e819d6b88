use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::decision::{
    AgentDecision, AgentKind, CompletenessDecision, HandoffDecision, IntentDecision,
    NextStepDecision, PendingHandoff, SupervisorPlan, SupervisorValidation,
};

#[derive(Clone, Debug, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// The single mutable record threaded through one turn.
///
/// Created (or loaded) at turn start, mutated node by node, and handed to
/// the session store at turn end. History is append-only: entries are never
/// edited after being pushed.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConversationState {
    // Identity
    pub session_id: String,
    #[serde(default)]
    pub thread_id: Option<String>,
    #[serde(default)]
    pub user_id: Option<String>,
    pub language: String,

    // Input
    #[serde(default)]
    pub user_text: String,
    #[serde(default)]
    pub last_user_text: Option<String>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[serde(default)]
    pub turn_count: u32,

    // Cross-turn profile, loaded best-effort at ingest
    #[serde(default)]
    pub user_profile: Option<Value>,
    #[serde(default)]
    pub is_returning_user: bool,

    // Per-turn decisions
    #[serde(default)]
    pub intent_decision: Option<IntentDecision>,
    #[serde(default)]
    pub agent_decision: Option<AgentDecision>,
    #[serde(default)]
    pub handoff_decision: Option<HandoffDecision>,
    #[serde(default)]
    pub completeness_decision: Option<CompletenessDecision>,
    #[serde(default)]
    pub next_step_decision: Option<NextStepDecision>,

    // Routing
    pub current_agent: AgentKind,
    #[serde(default)]
    pub previous_agent: Option<AgentKind>,
    #[serde(default)]
    pub handoff_chain: Vec<AgentKind>,
    #[serde(default)]
    pub handoff_count: u32,
    #[serde(default)]
    pub pending_handoff: Option<PendingHandoff>,
    #[serde(default)]
    pub pending_handoff_created_at: Option<DateTime<Utc>>,

    // Adapter-owned scratch state and cross-domain shared facts
    #[serde(default)]
    pub agent_states: HashMap<AgentKind, Value>,
    #[serde(default)]
    pub shared_context: HashMap<String, Value>,

    // Output
    #[serde(default)]
    pub response_text: String,
    #[serde(default)]
    pub response_metadata: HashMap<String, Value>,
    #[serde(default)]
    pub needs_user_input: bool,
    #[serde(default)]
    pub is_complete: bool,
    #[serde(default)]
    pub is_escalated: bool,
    #[serde(default)]
    pub error_message: Option<String>,
    #[serde(default)]
    pub retry_count: u32,
    pub max_retries: u32,

    // Supervisor
    #[serde(default)]
    pub supervisor_plan: Option<SupervisorPlan>,
    #[serde(default)]
    pub supervisor_validation: Option<SupervisorValidation>,
    #[serde(default)]
    pub agent_results: HashMap<AgentKind, String>,
    #[serde(default)]
    pub supervisor_retry_count: u32,

    pub created_at: DateTime<Utc>,
    pub last_updated: DateTime<Utc>,
}

impl ConversationState {
    pub fn new(session_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            session_id: session_id.into(),
            thread_id: None,
            user_id: None,
            language: "ko".to_string(),
            user_text: String::new(),
            last_user_text: None,
            history: Vec::new(),
            turn_count: 0,
            user_profile: None,
            is_returning_user: false,
            intent_decision: None,
            agent_decision: None,
            handoff_decision: None,
            completeness_decision: None,
            next_step_decision: None,
            current_agent: AgentKind::IntentClassifier,
            previous_agent: None,
            handoff_chain: Vec::new(),
            handoff_count: 0,
            pending_handoff: None,
            pending_handoff_created_at: None,
            agent_states: HashMap::new(),
            shared_context: HashMap::new(),
            response_text: String::new(),
            response_metadata: HashMap::new(),
            needs_user_input: false,
            is_complete: false,
            is_escalated: false,
            error_message: None,
            retry_count: 0,
            max_retries: 3,
            supervisor_plan: None,
            supervisor_validation: None,
            agent_results: HashMap::new(),
            supervisor_retry_count: 0,
            created_at: now,
            last_updated: now,
        }
    }

    /// Stage a new user message and clear per-turn outputs.
    ///
    /// Cross-turn routing facts (current agent, hand-off chain, pending
    /// hand-off, `needs_user_input`) survive so the next routing pass can
    /// see them. The ingest node appends to history via [`ingest_turn`].
    ///
    /// [`ingest_turn`]: ConversationState::ingest_turn
    pub fn receive_user_text(&mut self, text: &str) {
        if !self.user_text.is_empty() {
            self.last_user_text = Some(std::mem::take(&mut self.user_text));
        }
        self.user_text = text.to_string();

        self.intent_decision = None;
        self.agent_decision = None;
        self.handoff_decision = None;
        self.completeness_decision = None;
        self.next_step_decision = None;

        self.response_text.clear();
        self.response_metadata.clear();
        self.is_complete = false;
        self.is_escalated = false;
        self.error_message = None;

        self.supervisor_plan = None;
        self.supervisor_validation = None;
        self.agent_results.clear();
        self.supervisor_retry_count = 0;

        self.touch();
    }

    /// Append the staged user message to history and advance the turn
    /// counter. History is append-only; prior entries are never edited.
    pub fn ingest_turn(&mut self) {
        self.history.push(ChatMessage::user(self.user_text.clone()));
        self.turn_count += 1;
        self.touch();
    }

    /// [`receive_user_text`] plus [`ingest_turn`] in one step, for callers
    /// that do not run the full turn graph.
    ///
    /// [`receive_user_text`]: ConversationState::receive_user_text
    /// [`ingest_turn`]: ConversationState::ingest_turn
    pub fn begin_turn(&mut self, text: &str) {
        self.receive_user_text(text);
        self.ingest_turn();
    }

    pub fn push_assistant(&mut self, text: impl Into<String>) {
        self.history.push(ChatMessage::assistant(text));
        self.touch();
    }

    /// Move to a different agent, remembering the one we left.
    pub fn set_agent(&mut self, agent: AgentKind) {
        if self.current_agent != agent {
            self.previous_agent = Some(self.current_agent);
            self.current_agent = agent;
        }
        self.touch();
    }

    pub fn record_handoff(&mut self, to: AgentKind) {
        self.handoff_chain.push(to);
        self.handoff_count += 1;
        self.touch();
    }

    /// Clear the hand-off chain after a resolution or forced escalation.
    pub fn reset_handoff_chain(&mut self) {
        self.handoff_chain.clear();
        self.handoff_count = 0;
        self.touch();
    }

    pub fn clear_pending_handoff(&mut self) {
        self.pending_handoff = None;
        self.pending_handoff_created_at = None;
        self.touch();
    }

    pub fn is_first_turn(&self) -> bool {
        self.turn_count <= 1
    }

    pub fn touch(&mut self) {
        self.last_updated = Utc::now();
    }
}

impl Default for ConversationState {
    fn default() -> Self {
        Self::new(format!("session_{}", Utc::now().format("%Y%m%d_%H%M%S")))
    }
}
