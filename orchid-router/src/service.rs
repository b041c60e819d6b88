use std::sync::Arc;

use orchid_core::{
    ConversationState, Intent, OrchidError, SessionStore, TraceContext,
};
use uuid::Uuid;

use crate::config::RouterConfig;
use crate::graph::TurnGraph;

/// What a caller gets back for one processed message.
#[derive(Clone, Debug)]
pub struct TurnReply {
    pub message_id: String,
    pub session_id: String,
    pub agent: orchid_core::AgentKind,
    pub response: String,
    pub intent: Option<Intent>,
    pub needs_user_input: bool,
    pub is_escalated: bool,
    pub decision_calls: u32,
    pub elapsed_ms: u64,
    pub trace_id: String,
}

/// Front door for one conversation turn: load or create the session,
/// run the turn graph, and recover from mid-turn failures off the last
/// checkpoint.
pub struct ChatService {
    graph: TurnGraph,
    store: Arc<dyn SessionStore>,
    config: RouterConfig,
}

impl ChatService {
    pub fn new(graph: TurnGraph, store: Arc<dyn SessionStore>, config: RouterConfig) -> Self {
        Self {
            graph,
            store,
            config,
        }
    }

    pub async fn process_message(
        &self,
        session_id: &str,
        text: &str,
    ) -> Result<TurnReply, OrchidError> {
        let mut state = match self.store.load(session_id).await? {
            Some(existing) => existing,
            None => ConversationState::new(session_id),
        };
        state.receive_user_text(text);

        let trace = TraceContext::new(session_id);
        tracing::info!(session = session_id, trace = %trace.trace_id, "processing turn");

        match self.graph.invoke(state, &trace).await {
            Ok(state) => Ok(reply_from(state, &trace)),
            // Persistence failures mean the checkpoint itself cannot be
            // trusted, so they surface as-is instead of entering recovery.
            Err(err @ OrchidError::Persistence(_)) => Err(err),
            Err(err) => self.recover(session_id, text, err, &trace).await,
        }
    }

    /// Roll the session back to its last saved checkpoint and answer with a
    /// recovery message. Repeated failures past the retry budget suggest a
    /// fresh session instead of retrying forever.
    async fn recover(
        &self,
        session_id: &str,
        text: &str,
        cause: OrchidError,
        trace: &TraceContext,
    ) -> Result<TurnReply, OrchidError> {
        tracing::warn!(session = session_id, error = %cause, "turn failed, recovering from checkpoint");

        let mut state = match self.store.load(session_id).await? {
            Some(checkpoint) => checkpoint,
            None => ConversationState::new(session_id),
        };
        state.retry_count += 1;
        state.error_message = Some(cause.to_string());

        let exhausted = state.retry_count > self.config.max_retries;
        let message = recovery_message(&state.language, text, exhausted);
        state.response_text = message.clone();
        state.needs_user_input = !exhausted;
        state.push_assistant(message);
        self.store.save(&state).await?;

        Ok(reply_from(state, trace))
    }
}

fn reply_from(state: ConversationState, trace: &TraceContext) -> TurnReply {
    let decision_calls = state
        .response_metadata
        .get("decision_calls")
        .and_then(|v| v.as_u64())
        .unwrap_or(0) as u32;
    TurnReply {
        message_id: Uuid::new_v4().to_string(),
        session_id: state.session_id.clone(),
        agent: state.current_agent,
        response: state.response_text.clone(),
        intent: state.intent_decision.as_ref().map(|d| d.intent),
        needs_user_input: state.needs_user_input,
        is_escalated: state.is_escalated,
        decision_calls,
        elapsed_ms: trace.elapsed().as_millis() as u64,
        trace_id: trace.trace_id.clone(),
    }
}

fn recovery_message(language: &str, text: &str, exhausted: bool) -> String {
    let truncated: String = text.chars().take(40).collect();
    if exhausted {
        if language == "en" {
            "I'm having repeated trouble with this conversation. Starting a new session may help."
                .to_string()
        } else {
            "대화 처리에 반복적으로 문제가 발생하고 있어요. 새로운 세션으로 다시 시작해 주시면 도움이 될 것 같아요."
                .to_string()
        }
    } else if language == "en" {
        format!(
            "Sorry, something went wrong while handling \"{truncated}\". Could you send that again?"
        )
    } else {
        format!("죄송해요, \"{truncated}\" 처리 중 문제가 발생했어요. 다시 한번 보내주시겠어요?")
    }
}
