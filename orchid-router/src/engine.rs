use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use schemars::JsonSchema;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::json;

use orchid_core::{
    decision_cache_key, output_schema, parse_structured, AgentDecision, AgentKind,
    CompletenessDecision, ConversationState, DecisionCache, HandoffDecision, IntentDecision,
    LlmCaller, LlmRequest, NextAction, NextStepDecision, NullObserver, OrchidError, ParseOutcome,
    PendingHandoff, SupervisorPlan, SupervisorValidation, TurnObserver,
};

use crate::config::RouterConfig;
use crate::loop_guard::{GuardOutcome, LoopGuard};

const AGENT_CAPABILITIES: &str = "\
- skincare: skin concerns, routines, ingredient questions, personalized skincare advice\n\
- recommend: product discovery, comparisons, gift suggestions, purchase recommendations\n\
- after_service: device faults, repairs, warranty coverage, replacement parts\n\
- customer_service: orders, delivery, refunds, exchanges, account and payment issues";

const INTENT_SYSTEM: &str = "You classify a shopper's message into one intent. \
Available domains:\n{capabilities}\n\
Set is_multi_intent when the message clearly spans more than one domain. \
Respond with JSON matching the provided schema only.";

const AGENT_SYSTEM: &str = "You pick the single best specialist agent for the \
conversation. Available agents:\n{capabilities}\n\
Respond with JSON matching the provided schema only.";

const HANDOFF_SYSTEM: &str = "You decide whether an in-progress conversation \
should transfer to a different specialist agent. Only recommend a hand-off when \
the active agent cannot serve the request. Include a short confirmation question \
for the user in user_message. Respond with JSON matching the provided schema only.";

const COMPLETENESS_SYSTEM: &str = "You check whether the active agent has \
collected enough information to act. List what is still missing and propose \
clarification questions. Respond with JSON matching the provided schema only.";

const NEXT_STEP_SYSTEM: &str = "You choose the active agent's next action for \
this conversation. Respond with JSON matching the provided schema only.";

const PLAN_SYSTEM: &str = "The user's request spans several domains. Pick the \
minimal set of agents needed to cover every aspect, and whether they can run in \
parallel. Available agents:\n{capabilities}\n\
Respond with JSON matching the provided schema only.";

const VALIDATE_SYSTEM: &str = "You are given a user request and the answers \
produced by several specialist agents. Judge whether the answers together cover \
every aspect of the request, which agents should retry, and how to merge the \
answers. Respond with JSON matching the provided schema only.";

const HANDOFF_REPLY_SYSTEM: &str = "The user was asked whether they want to be \
transferred to a different specialist. Interpret their reply as accept, reject, \
or unclear. Respond with JSON matching the provided schema only.";

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
enum HandoffChoice {
    Accept,
    Reject,
    #[default]
    Unclear,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
struct HandoffReplyAnalysis {
    choice: HandoffChoice,
    confidence: f64,
    #[serde(default)]
    reason: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum RouteCase {
    FirstTurn,
    Handoff,
    Continue,
    Full,
}

/// Routing result: the updated state plus the number of LLM-backed
/// judgments this turn actually issued.
#[derive(Debug)]
pub struct RoutedState {
    pub state: ConversationState,
    pub calls: u32,
}

/// Issues the five routing judgments and fuses them under one of four
/// cost-minimizing protocols, so a turn only pays for the decisions its
/// shape actually needs.
pub struct DecisionEngine {
    llm: Arc<dyn LlmCaller>,
    cache: Option<Arc<dyn DecisionCache>>,
    guard: LoopGuard,
    observer: Arc<dyn TurnObserver>,
    config: RouterConfig,
}

impl DecisionEngine {
    pub fn new(llm: Arc<dyn LlmCaller>, config: RouterConfig) -> Self {
        let guard = LoopGuard::new(config.handoff_threshold);
        Self {
            llm,
            cache: None,
            guard,
            observer: Arc::new(NullObserver),
            config,
        }
    }

    pub fn with_cache(mut self, cache: Arc<dyn DecisionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Main entry point: pick a protocol from the turn shape and run it.
    /// Never returns an error; a failed conditional path falls back to the
    /// full protocol, and a failed full protocol degrades to the default
    /// `unknown` decision set.
    pub async fn route(&self, mut state: ConversationState) -> RoutedState {
        let mut calls = 0u32;

        if state.pending_handoff.is_some() {
            self.resolve_pending_handoff(&mut state, &mut calls).await;
            return RoutedState { state, calls };
        }

        let case = self.pick_case(&state);
        tracing::debug!(session = %state.session_id, ?case, "routing protocol selected");
        let outcome = match case {
            RouteCase::FirstTurn => self.route_first_turn(&mut state, &mut calls).await,
            RouteCase::Handoff => self.route_handoff(&mut state, &mut calls).await,
            RouteCase::Continue => self.route_continue(&mut state, &mut calls).await,
            RouteCase::Full => self.route_full(&mut state, &mut calls).await,
        };

        if let Err(err) = outcome {
            tracing::warn!(session = %state.session_id, error = %err, "conditional route failed, falling back to full route");
            let fallback = if case == RouteCase::Full {
                Err(err)
            } else {
                self.route_full(&mut state, &mut calls).await
            };
            if let Err(err) = fallback {
                tracing::warn!(session = %state.session_id, error = %err, "full route failed, using default decisions");
                self.apply_default_decisions(&mut state);
            }
        }

        RoutedState { state, calls }
    }

    fn pick_case(&self, state: &ConversationState) -> RouteCase {
        if state.is_first_turn() || state.history.len() <= 1 {
            return RouteCase::FirstTurn;
        }
        if handoff_signalled(state) {
            return RouteCase::Handoff;
        }
        if AgentKind::dispatchable().contains(&state.current_agent) {
            return RouteCase::Continue;
        }
        RouteCase::Full
    }

    /// Case 1: nothing to hand off from, nothing yet collected. Intent and
    /// agent selection have no data dependency, so they run concurrently.
    async fn route_first_turn(
        &self,
        state: &mut ConversationState,
        calls: &mut u32,
    ) -> Result<(), OrchidError> {
        let (intent, agent) = tokio::join!(self.classify_intent(state), self.select_agent(state));
        *calls += 2;
        let intent = intent?;
        let agent = agent?;

        let target = if agent.selected_agent == AgentKind::Unknown {
            intent.intent.agent()
        } else {
            agent.selected_agent
        };
        state.intent_decision = Some(intent);
        state.agent_decision = Some(agent);
        state.set_agent(target);
        Ok(())
    }

    /// Case 2: each judgment feeds the next, so the chain is sequential.
    async fn route_handoff(
        &self,
        state: &mut ConversationState,
        calls: &mut u32,
    ) -> Result<(), OrchidError> {
        let intent = self.classify_intent(state).await;
        *calls += 1;
        let intent = intent?;
        state.intent_decision = Some(intent.clone());

        let agent = self.select_agent(state).await;
        *calls += 1;
        let agent = agent?;
        state.agent_decision = Some(agent.clone());

        let handoff = self.decide_handoff(state).await;
        *calls += 1;
        let handoff = handoff?;
        state.handoff_decision = Some(handoff.clone());

        state.shared_context.remove("handoff_requested");
        state.shared_context.remove("topic_shift");

        if handoff.should_handoff {
            let to = handoff
                .to_agent
                .unwrap_or(agent.selected_agent);
            // A hand-off to the already-active agent is an invalid
            // decision combination; the turn stays where it is.
            if to != state.current_agent {
                self.propose_handoff(state, to, &intent, &handoff);
            }
        } else if AgentKind::dispatchable().contains(&agent.selected_agent) {
            state.set_agent(agent.selected_agent);
        }
        Ok(())
    }

    /// Case 3: waiting on the user costs nothing; otherwise completeness
    /// and next-step are independent and run concurrently.
    async fn route_continue(
        &self,
        state: &mut ConversationState,
        calls: &mut u32,
    ) -> Result<(), OrchidError> {
        if state.needs_user_input {
            // Re-enter the same agent with zero judgment calls; the agent
            // resolves its own pending question.
            return Ok(());
        }

        let (completeness, next_step) = tokio::join!(
            self.check_completeness(state),
            self.decide_next_step(state)
        );
        *calls += 2;
        let completeness = completeness?;
        let next_step = next_step?;
        state.completeness_decision = Some(completeness);

        match next_step.next_action {
            NextAction::Escalate => {
                state.is_escalated = true;
                state.set_agent(AgentKind::CustomerService);
            }
            NextAction::Handoff => {
                // Surface the signal; the next turn takes the hand-off path.
                state
                    .shared_context
                    .insert("handoff_requested".into(), json!(true));
            }
            _ => {}
        }
        state.next_step_decision = Some(next_step);
        Ok(())
    }

    /// Case 4: all four judgments, parallelized in dependency order —
    /// intent/agent first, then hand-off/completeness over their results.
    async fn route_full(
        &self,
        state: &mut ConversationState,
        calls: &mut u32,
    ) -> Result<(), OrchidError> {
        let (intent, agent) = tokio::join!(self.classify_intent(state), self.select_agent(state));
        *calls += 2;
        let intent = intent?;
        let agent = agent?;
        state.intent_decision = Some(intent.clone());
        state.agent_decision = Some(agent.clone());

        let (handoff, completeness) = tokio::join!(
            self.decide_handoff(state),
            self.check_completeness(state)
        );
        *calls += 2;
        let handoff = handoff?;
        let completeness = completeness?;
        state.completeness_decision = Some(completeness);
        state.handoff_decision = Some(handoff.clone());

        let currently_dispatched = AgentKind::dispatchable().contains(&state.current_agent);
        let to = handoff.to_agent.unwrap_or(agent.selected_agent);
        if handoff.should_handoff && currently_dispatched && to != state.current_agent {
            self.propose_handoff(state, to, &intent, &handoff);
        } else {
            let target = if agent.selected_agent == AgentKind::Unknown {
                intent.intent.agent()
            } else {
                agent.selected_agent
            };
            state.set_agent(target);
        }
        Ok(())
    }

    /// Record the proposed hand-off with the loop guard; below the
    /// threshold the transfer waits for user confirmation, above it the
    /// guard escalates unconditionally.
    fn propose_handoff(
        &self,
        state: &mut ConversationState,
        to: AgentKind,
        intent: &IntentDecision,
        handoff: &HandoffDecision,
    ) {
        match self.guard.apply(state, to) {
            GuardOutcome::Escalated => {}
            GuardOutcome::Proceed => {
                let question = handoff
                    .user_message
                    .clone()
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| default_confirmation(&state.language, to));
                state.pending_handoff = Some(PendingHandoff {
                    from_agent: state.current_agent,
                    to_agent: to,
                    reason: handoff.reason.clone(),
                    confirmation_question: question.clone(),
                    detected_intent: intent.intent,
                    user_input: state.user_text.clone(),
                });
                state.pending_handoff_created_at = Some(Utc::now());
                state.needs_user_input = true;
                state.response_text = question;
            }
        }
    }

    /// The turn after a hand-off was proposed: interpret the user's reply.
    /// Obvious confirmations cost zero LLM calls; only an ambiguous reply
    /// pays for one.
    async fn resolve_pending_handoff(&self, state: &mut ConversationState, calls: &mut u32) {
        let Some(pending) = state.pending_handoff.clone() else {
            return;
        };
        let choice = match keyword_choice(&state.user_text) {
            Some(choice) => choice,
            None => {
                *calls += 1;
                match self.analyze_handoff_reply(state, &pending).await {
                    Ok(analysis) => analysis.choice,
                    Err(err) => {
                        tracing::warn!(session = %state.session_id, error = %err, "hand-off reply analysis failed");
                        HandoffChoice::Unclear
                    }
                }
            }
        };

        match choice {
            HandoffChoice::Accept => {
                state.set_agent(pending.to_agent);
                // The target answers the request that triggered the
                // transfer, not the confirmation phrase.
                state.last_user_text = Some(std::mem::replace(
                    &mut state.user_text,
                    pending.user_input.clone(),
                ));
                state.clear_pending_handoff();
                state.needs_user_input = false;
            }
            HandoffChoice::Reject => {
                state.clear_pending_handoff();
                state.needs_user_input = false;
            }
            HandoffChoice::Unclear => {
                state.needs_user_input = true;
                state.response_text = pending.confirmation_question.clone();
            }
        }
    }

    fn apply_default_decisions(&self, state: &mut ConversationState) {
        let reason = "decision engine unavailable".to_string();
        state.intent_decision = Some(IntentDecision {
            reason: reason.clone(),
            ..IntentDecision::default()
        });
        state.agent_decision = Some(AgentDecision {
            reason,
            ..AgentDecision::default()
        });
        state.set_agent(AgentKind::Unknown);
    }

    // ---- individual judgments ----

    pub async fn classify_intent(
        &self,
        state: &ConversationState,
    ) -> Result<IntentDecision, OrchidError> {
        let key = decision_cache_key(
            "intent",
            &state.user_text,
            &[("lang", state.language.clone())],
        );
        let user = format!(
            "Conversation so far:\n{}\nCurrent message: {}",
            history_tail(state, 6),
            state.user_text
        );
        self.call_structured(
            "intent",
            Some((key, self.config.intent_cache_ttl)),
            INTENT_SYSTEM.replace("{capabilities}", AGENT_CAPABILITIES),
            user,
        )
        .await
    }

    pub async fn select_agent(
        &self,
        state: &ConversationState,
    ) -> Result<AgentDecision, OrchidError> {
        let intent = state
            .intent_decision
            .as_ref()
            .map(|d| d.intent.to_string())
            .unwrap_or_else(|| "not yet classified".to_string());
        let key = decision_cache_key(
            "agent",
            &state.user_text,
            &[
                ("intent", intent.clone()),
                ("current", state.current_agent.to_string()),
            ],
        );
        let user = format!(
            "Detected intent: {intent}\nActive agent: {}\nCurrent message: {}",
            state.current_agent, state.user_text
        );
        self.call_structured(
            "agent",
            Some((key, self.config.intent_cache_ttl)),
            AGENT_SYSTEM.replace("{capabilities}", AGENT_CAPABILITIES),
            user,
        )
        .await
    }

    pub async fn decide_handoff(
        &self,
        state: &ConversationState,
    ) -> Result<HandoffDecision, OrchidError> {
        let intent = state
            .intent_decision
            .as_ref()
            .map(|d| d.intent.to_string())
            .unwrap_or_default();
        let selected = state
            .agent_decision
            .as_ref()
            .map(|d| d.selected_agent.to_string())
            .unwrap_or_default();
        let key = decision_cache_key(
            "handoff",
            &state.user_text,
            &[
                ("current", state.current_agent.to_string()),
                ("intent", intent.clone()),
                ("selected", selected.clone()),
            ],
        );
        let user = format!(
            "Active agent: {}\nDetected intent: {intent}\nBest-fit agent: {selected}\nConversation so far:\n{}\nCurrent message: {}",
            state.current_agent,
            history_tail(state, 6),
            state.user_text
        );
        self.call_structured(
            "handoff",
            Some((key, self.config.handoff_cache_ttl)),
            HANDOFF_SYSTEM.to_string(),
            user,
        )
        .await
    }

    pub async fn check_completeness(
        &self,
        state: &ConversationState,
    ) -> Result<CompletenessDecision, OrchidError> {
        let scratch = state
            .agent_states
            .get(&state.current_agent)
            .cloned()
            .unwrap_or(serde_json::Value::Null);
        let user = format!(
            "Active agent: {}\nCollected so far: {scratch}\nConversation so far:\n{}\nCurrent message: {}",
            state.current_agent,
            history_tail(state, 8),
            state.user_text
        );
        // Completeness is conversation-specific; caching it would bleed one
        // session's progress into another, so it is never cached.
        self.call_structured("completeness", None, COMPLETENESS_SYSTEM.to_string(), user)
            .await
    }

    pub async fn decide_next_step(
        &self,
        state: &ConversationState,
    ) -> Result<NextStepDecision, OrchidError> {
        let completeness = state
            .completeness_decision
            .as_ref()
            .map(|d| format!("is_complete={}, missing={:?}", d.is_complete, d.missing_info))
            .unwrap_or_else(|| "not checked".to_string());
        let user = format!(
            "Active agent: {}\nCompleteness: {completeness}\nConversation so far:\n{}\nCurrent message: {}",
            state.current_agent,
            history_tail(state, 8),
            state.user_text
        );
        self.call_structured("next_step", None, NEXT_STEP_SYSTEM.to_string(), user)
            .await
    }

    async fn analyze_handoff_reply(
        &self,
        state: &ConversationState,
        pending: &PendingHandoff,
    ) -> Result<HandoffReplyAnalysis, OrchidError> {
        let user = format!(
            "Proposed transfer: {} -> {}\nQuestion asked: {}\nUser reply: {}",
            pending.from_agent, pending.to_agent, pending.confirmation_question, state.user_text
        );
        self.call_structured("handoff_reply", None, HANDOFF_REPLY_SYSTEM.to_string(), user)
            .await
    }

    // ---- supervisor judgments ----

    pub async fn plan_agents(
        &self,
        state: &ConversationState,
    ) -> Result<SupervisorPlan, OrchidError> {
        let user = format!("Request: {}", state.user_text);
        self.call_structured(
            "supervisor_plan",
            None,
            PLAN_SYSTEM.replace("{capabilities}", AGENT_CAPABILITIES),
            user,
        )
        .await
    }

    pub async fn validate_coverage(
        &self,
        state: &ConversationState,
    ) -> Result<SupervisorValidation, OrchidError> {
        let mut sections = String::new();
        for (agent, result) in &state.agent_results {
            sections.push_str(&format!("[{agent}]\n{result}\n\n"));
        }
        let user = format!("Request: {}\n\nAgent answers:\n{sections}", state.user_text);
        self.call_structured("supervisor_validate", None, VALIDATE_SYSTEM.to_string(), user)
            .await
    }

    /// Free-text synthesis used by the integrated merge strategy.
    pub async fn synthesize(
        &self,
        system: &str,
        user: &str,
    ) -> Result<String, OrchidError> {
        let request =
            LlmRequest::text(system, user).with_temperature(self.config.temperature);
        let reply = tokio::time::timeout(self.config.decision_timeout, self.llm.invoke(request))
            .await
            .map_err(|_| OrchidError::Timeout(self.config.decision_timeout))?
            .map_err(|err| OrchidError::DecisionUnavailable(err.to_string()))?;
        Ok(reply.content)
    }

    // ---- call pipeline ----

    /// Cache lookup, timed LLM call, typed parse, best-effort cache fill.
    /// Every failure mode collapses to `DecisionUnavailable` so callers
    /// have exactly one condition to recover from.
    async fn call_structured<T>(
        &self,
        kind: &'static str,
        cache_slot: Option<(String, Duration)>,
        system: String,
        user: String,
    ) -> Result<T, OrchidError>
    where
        T: DeserializeOwned + Serialize + JsonSchema,
    {
        let started = Instant::now();
        if let (Some(cache), Some((key, _))) = (&self.cache, &cache_slot) {
            match cache.get(key).await {
                Ok(Some(value)) => {
                    if let Ok(decision) = serde_json::from_value::<T>(value) {
                        tracing::debug!(kind, "decision served from cache");
                        self.observer.on_decision(kind, true, started.elapsed());
                        return Ok(decision);
                    }
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(kind, error = %err, "decision cache read failed"),
            }
        }

        let request = LlmRequest {
            system,
            user,
            output_schema: Some(output_schema::<T>()),
            temperature: Some(self.config.temperature),
        };
        let reply = tokio::time::timeout(self.config.decision_timeout, self.llm.invoke(request))
            .await
            .map_err(|_| {
                OrchidError::DecisionUnavailable(format!(
                    "{kind} judgment timed out after {:?}",
                    self.config.decision_timeout
                ))
            })?
            .map_err(|err| OrchidError::DecisionUnavailable(err.to_string()))?;

        match parse_structured::<T>(&reply.content) {
            ParseOutcome::Parsed(decision) => {
                self.observer.on_decision(kind, false, started.elapsed());
                if let (Some(cache), Some((key, ttl))) = (&self.cache, cache_slot) {
                    if let Ok(value) = serde_json::to_value(&decision) {
                        if let Err(err) = cache.set(&key, value, ttl).await {
                            tracing::warn!(kind, error = %err, "decision cache write failed");
                        }
                    }
                }
                Ok(decision)
            }
            ParseOutcome::Failed { reason, .. } => Err(OrchidError::DecisionUnavailable(format!(
                "{kind} judgment returned malformed output: {reason}"
            ))),
        }
    }
}

/// Adapter-installed or engine-derived signals that this turn should take
/// the hand-off path.
fn handoff_signalled(state: &ConversationState) -> bool {
    let marker = |key: &str| {
        state
            .shared_context
            .get(key)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    };
    if marker("handoff_requested") || marker("topic_shift") {
        return true;
    }
    match domain_hint(&state.user_text) {
        Some(hint) => {
            hint != state.current_agent && AgentKind::dispatchable().contains(&state.current_agent)
        }
        None => false,
    }
}

/// Cheap keyword probe for an obvious topic shift. Unambiguous single-domain
/// hints only; anything mixed falls through to the full protocol, which
/// still reaches the hand-off judgment.
fn domain_hint(text: &str) -> Option<AgentKind> {
    let lowered = text.to_lowercase();
    let tables: [(&[&str], AgentKind); 4] = [
        (
            &["주문", "배송", "환불", "교환", "결제", "order", "delivery", "refund", "payment"],
            AgentKind::CustomerService,
        ),
        (
            &["고장", "수리", "보증", "warranty", "repair", "defect"],
            AgentKind::AfterService,
        ),
        (&["추천", "recommend", "suggest"], AgentKind::Recommend),
        (&["피부", "스킨케어", "skin"], AgentKind::Skincare),
    ];
    let mut hint = None;
    for (keywords, agent) in tables {
        if keywords.iter().any(|k| lowered.contains(k)) {
            if hint.is_some() {
                return None;
            }
            hint = Some(agent);
        }
    }
    hint
}

fn keyword_choice(text: &str) -> Option<HandoffChoice> {
    let lowered = text.trim().to_lowercase();
    const ACCEPT: [&str; 8] = ["네", "예", "좋아", "그래", "부탁", "yes", "sure", "ok"];
    const REJECT: [&str; 6] = ["아니", "아뇨", "괜찮", "no", "nope", "stay"];
    if REJECT.iter().any(|k| lowered.contains(k)) {
        return Some(HandoffChoice::Reject);
    }
    if ACCEPT.iter().any(|k| lowered.contains(k)) {
        return Some(HandoffChoice::Accept);
    }
    None
}

fn default_confirmation(language: &str, to: AgentKind) -> String {
    if language == "en" {
        format!(
            "It sounds like the {} team can help with this. Shall I connect you?",
            to.title()
        )
    } else {
        format!("{} 상담으로 연결해 드릴까요?", to.title())
    }
}

fn history_tail(state: &ConversationState, n: usize) -> String {
    let start = state.history.len().saturating_sub(n);
    state.history[start..]
        .iter()
        .map(|message| {
            let role = match message.role {
                orchid_core::Role::User => "user",
                orchid_core::Role::Assistant => "assistant",
                orchid_core::Role::System => "system",
            };
            format!("{role}: {}", message.content)
        })
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_hint_is_none_for_mixed_domains() {
        assert_eq!(domain_hint("추천도 해주고 피부 상담도 해줘"), None);
        assert_eq!(domain_hint("내 주문 어디 있어요?"), Some(AgentKind::CustomerService));
        assert_eq!(domain_hint("hello there"), None);
    }

    #[test]
    fn keyword_choice_prefers_rejection() {
        assert_eq!(keyword_choice("아니요, 괜찮아요"), Some(HandoffChoice::Reject));
        assert_eq!(keyword_choice("네 부탁해요"), Some(HandoffChoice::Accept));
        assert_eq!(keyword_choice("음..."), None);
    }
}
