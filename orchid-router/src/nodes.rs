use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};

use orchid_core::{
    agent_cache_key, AgentAdapter, AgentKind, ConversationState, DecisionCache, OrchidError,
    SessionStore, TraceContext, TurnObserver,
};

use crate::engine::{DecisionEngine, RoutedState};
use crate::graph::TurnNode;
use crate::loop_guard::{GuardOutcome, LoopGuard};

pub mod node {
    pub const INGEST: &str = "ingest";
    pub const ROUTE: &str = "route";
    pub const DISPATCH: &str = "dispatch";
    pub const UNKNOWN: &str = "unknown_handler";
    pub const RESPOND: &str = "respond";
    pub const SUPERVISOR_PLAN: &str = "supervisor_plan";
    pub const SUPERVISOR_EXECUTE: &str = "supervisor_execute";
    pub const SUPERVISOR_VALIDATE: &str = "supervisor_validate";
    pub const SUPERVISOR_MERGE: &str = "supervisor_merge";
}

pub fn agent_node_name(kind: AgentKind) -> &'static str {
    match kind {
        AgentKind::Skincare => "skincare_agent",
        AgentKind::Recommend => "recommend_agent",
        AgentKind::AfterService => "after_service_agent",
        AgentKind::CustomerService => "customer_service_agent",
        AgentKind::IntentClassifier | AgentKind::Unknown => node::UNKNOWN,
    }
}

/// Cross-turn profile capability consumed at ingest. Failure degrades to
/// "no profile" and never fails the turn.
#[async_trait]
pub trait ProfileSource: Send + Sync {
    async fn load_profile(&self, user_id: &str) -> Result<Option<Value>, OrchidError>;
}

pub struct IngestNode {
    profiles: Option<Arc<dyn ProfileSource>>,
}

impl IngestNode {
    pub fn new(profiles: Option<Arc<dyn ProfileSource>>) -> Self {
        Self { profiles }
    }
}

#[async_trait]
impl TurnNode for IngestNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        state.ingest_turn();
        if let (Some(profiles), Some(user_id)) = (&self.profiles, state.user_id.clone()) {
            match profiles.load_profile(&user_id).await {
                Ok(profile) => {
                    state.is_returning_user = profile.is_some();
                    state.user_profile = profile;
                }
                Err(err) => {
                    tracing::debug!(user = %user_id, error = %err, "profile load failed, continuing without");
                }
            }
        }
        Ok(state)
    }
}

pub struct RouteNode {
    engine: Arc<DecisionEngine>,
}

impl RouteNode {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TurnNode for RouteNode {
    async fn run(
        &self,
        state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        let RoutedState { mut state, calls } = self.engine.route(state).await;
        state
            .response_metadata
            .insert("decision_calls".into(), json!(calls));
        Ok(state)
    }
}

/// Conditional edge out of the route node.
pub fn route_after_router(state: &ConversationState) -> &'static str {
    if state.is_escalated && !state.response_text.is_empty() {
        return node::RESPOND;
    }
    if state.pending_handoff.is_some() {
        // A proposed hand-off ends the turn awaiting confirmation.
        return node::RESPOND;
    }
    if state
        .intent_decision
        .as_ref()
        .map(|d| d.is_multi_intent)
        .unwrap_or(false)
    {
        return node::SUPERVISOR_PLAN;
    }
    if AgentKind::dispatchable().contains(&state.current_agent) {
        node::DISPATCH
    } else {
        node::UNKNOWN
    }
}

/// Pure lookup step: marks the resolved adapter active. An identifier
/// outside the dispatchable set never reaches here; the route edge already
/// diverted it to the unknown handler.
pub struct DispatchNode;

#[async_trait]
impl TurnNode for DispatchNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        state.shared_context.remove("redispatch");
        state
            .response_metadata
            .insert("dispatched_agent".into(), json!(state.current_agent.as_str()));
        Ok(state)
    }
}

/// Runs one domain adapter with generic response caching and continuation
/// hand-off handling. An adapter failure is recorded on the state and
/// answered with a safe fallback message; it never propagates.
pub struct AgentNode {
    adapter: Arc<dyn AgentAdapter>,
    cache: Option<Arc<dyn DecisionCache>>,
    guard: LoopGuard,
}

impl AgentNode {
    pub fn new(
        adapter: Arc<dyn AgentAdapter>,
        cache: Option<Arc<dyn DecisionCache>>,
        guard: LoopGuard,
    ) -> Self {
        Self {
            adapter,
            cache,
            guard,
        }
    }

    fn cache_key(&self, state: &ConversationState) -> Option<String> {
        let policy = self.adapter.cache_policy();
        if !policy.enabled || state.user_text.is_empty() {
            return None;
        }
        Some(agent_cache_key(
            &policy.namespace,
            &state.user_text,
            &[("lang", state.language.clone())],
        ))
    }
}

#[async_trait]
impl TurnNode for AgentNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        if let (Some(cache), Some(key)) = (&self.cache, self.cache_key(&state)) {
            match cache.get(&key).await {
                Ok(Some(value)) => {
                    if let Some(text) = value.as_str() {
                        state.response_text = text.to_string();
                        state.is_complete = true;
                        state
                            .response_metadata
                            .insert("agent_cache_hit".into(), json!(true));
                        return Ok(state);
                    }
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::warn!(agent = %self.adapter.kind(), error = %err, "agent cache read failed")
                }
            }
        }

        match self.adapter.process(state.clone()).await {
            Ok(mut next) => {
                if !next.needs_user_input && !next.response_text.is_empty() {
                    if let (Some(cache), Some(key)) = (&self.cache, self.cache_key(&next)) {
                        let ttl = self.adapter.cache_policy().ttl;
                        if let Err(err) =
                            cache.set(&key, json!(next.response_text.clone()), ttl).await
                        {
                            tracing::warn!(agent = %self.adapter.kind(), error = %err, "agent cache write failed");
                        }
                    }
                }

                if let Some(target) = continuation_target(&next) {
                    next.shared_context.remove("continue_with");
                    if self.guard.apply(&mut next, target) == GuardOutcome::Proceed {
                        next.set_agent(target);
                        next.shared_context.insert("redispatch".into(), json!(true));
                    }
                }
                Ok(next)
            }
            Err(err) => {
                tracing::warn!(agent = %self.adapter.kind(), error = %err, "adapter failed, answering with fallback");
                state.error_message = Some(err.to_string());
                state.response_text = fallback_message(&state.language);
                state
                    .response_metadata
                    .insert("adapter_error".into(), json!(true));
                state.needs_user_input = false;
                Ok(state)
            }
        }
    }
}

/// Adapter-requested immediate continuation with another agent.
fn continuation_target(state: &ConversationState) -> Option<AgentKind> {
    state
        .shared_context
        .get("continue_with")
        .and_then(|v| v.as_str())
        .and_then(AgentKind::parse)
        .filter(|kind| AgentKind::dispatchable().contains(kind))
}

fn fallback_message(language: &str) -> String {
    if language == "en" {
        "Sorry, something went wrong while handling that. Could you try asking again?".to_string()
    } else {
        "죄송해요, 처리 중 문제가 발생했어요. 다시 한번 말씀해 주시겠어요?".to_string()
    }
}

/// Conditional edge after an agent node: the only cycle in the graph,
/// bounded by the loop guard.
pub fn route_after_agent(state: &ConversationState) -> &'static str {
    let redispatch = state
        .shared_context
        .get("redispatch")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if redispatch && !state.is_escalated {
        node::DISPATCH
    } else {
        node::RESPOND
    }
}

/// Fallback for turns no agent claims.
pub struct UnknownNode;

#[async_trait]
impl TurnNode for UnknownNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        state.response_text = if state.language == "en" {
            "I can help with skincare advice, product recommendations, orders, and after-sales service. What would you like to do?"
                .to_string()
        } else {
            "스킨케어 상담, 제품 추천, 주문 문의, A/S 문의를 도와드릴 수 있어요. 어떤 것이 필요하신가요?"
                .to_string()
        };
        state.needs_user_input = true;
        Ok(state)
    }
}

/// Terminal node: attaches presentation metadata, appends the assistant
/// reply to history, and persists the state. A persistence failure here is
/// fatal to the turn and surfaces to the caller for checkpoint recovery.
pub struct RespondNode {
    store: Arc<dyn SessionStore>,
    observer: Arc<dyn TurnObserver>,
}

impl RespondNode {
    pub fn new(store: Arc<dyn SessionStore>, observer: Arc<dyn TurnObserver>) -> Self {
        Self { store, observer }
    }
}

#[async_trait]
impl TurnNode for RespondNode {
    async fn run(
        &self,
        mut state: ConversationState,
        trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        if state.response_text.is_empty() {
            state.response_text = fallback_message(&state.language);
        }

        state
            .response_metadata
            .insert("agent".into(), json!(state.current_agent.as_str()));
        if let Some(intent) = state.intent_decision.as_ref().map(|d| d.intent) {
            state
                .response_metadata
                .insert("intent".into(), json!(intent.to_string()));
        }
        state
            .response_metadata
            .insert("trace_id".into(), json!(trace.trace_id.clone()));
        state
            .response_metadata
            .insert("elapsed_ms".into(), json!(trace.elapsed().as_millis() as u64));
        if state.is_escalated {
            state.response_metadata.insert("escalated".into(), json!(true));
        }

        let reply = state.response_text.clone();
        state.push_assistant(reply);

        self.store.save(&state).await?;
        self.observer.on_checkpoint_saved(&state.session_id);
        Ok(state)
    }
}
