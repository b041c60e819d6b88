use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;
use tokio::task::JoinSet;

use orchid_core::{
    AgentAdapter, AgentKind, ConversationState, MergeStrategy, OrchidError, SupervisorPlan,
    SupervisorValidation, TraceContext,
};

use crate::engine::DecisionEngine;
use crate::graph::TurnNode;
use crate::nodes::node;

const AGENT_ERROR_MARKER: &str = "[unavailable]";

const MERGE_SYSTEM: &str = "You combine several specialist answers into one \
coherent reply in the user's language. Keep every substantive point; do not \
invent new information.";

/// One LLM call decides the minimal agent set for a multi-domain turn.
pub struct PlanNode {
    engine: Arc<DecisionEngine>,
}

impl PlanNode {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TurnNode for PlanNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        let mut plan = match self.engine.plan_agents(&state).await {
            Ok(plan) => plan,
            Err(err) => {
                tracing::warn!(session = %state.session_id, error = %err, "supervisor plan failed, degrading to single agent");
                SupervisorPlan {
                    agents: vec![fallback_agent(&state)],
                    parallel: false,
                    is_complex: false,
                    reasoning: "plan unavailable".to_string(),
                }
            }
        };
        plan.agents
            .retain(|agent| AgentKind::dispatchable().contains(agent));
        plan.agents.dedup();
        if plan.agents.is_empty() {
            plan.agents.push(fallback_agent(&state));
        }
        if plan.agents.len() == 1 {
            // Not actually multi-domain: fall back to the single-agent path.
            state.set_agent(plan.agents[0]);
        }
        state.supervisor_plan = Some(plan);
        Ok(state)
    }
}

fn fallback_agent(state: &ConversationState) -> AgentKind {
    let from_decision = state
        .agent_decision
        .as_ref()
        .map(|d| d.selected_agent)
        .filter(|a| AgentKind::dispatchable().contains(a));
    from_decision.unwrap_or(AgentKind::CustomerService)
}

pub fn route_after_plan(state: &ConversationState) -> &'static str {
    let planned = state
        .supervisor_plan
        .as_ref()
        .map(|plan| plan.agents.len())
        .unwrap_or(0);
    if planned > 1 {
        node::SUPERVISOR_EXECUTE
    } else {
        node::DISPATCH
    }
}

/// Fan the turn out to the planned agents. Concurrency is capped at the
/// planned set; one adapter failing is captured as an error marker and
/// never cancels its siblings.
pub struct ExecuteNode {
    adapters: HashMap<AgentKind, Arc<dyn AgentAdapter>>,
}

impl ExecuteNode {
    pub fn new(adapters: HashMap<AgentKind, Arc<dyn AgentAdapter>>) -> Self {
        Self { adapters }
    }

    fn targets(&self, state: &ConversationState) -> Vec<AgentKind> {
        let planned = state
            .supervisor_plan
            .as_ref()
            .map(|plan| plan.agents.clone())
            .unwrap_or_default();
        match &state.supervisor_validation {
            Some(validation) if !validation.retry_agents.is_empty() => validation
                .retry_agents
                .iter()
                .copied()
                .filter(|agent| planned.contains(agent))
                .collect(),
            _ => planned,
        }
    }
}

#[async_trait]
impl TurnNode for ExecuteNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        let targets = self.targets(&state);
        let parallel = state
            .supervisor_plan
            .as_ref()
            .map(|plan| plan.parallel)
            .unwrap_or(true);

        let mut outcomes: Vec<(AgentKind, Result<ConversationState, OrchidError>)> = Vec::new();
        if parallel {
            let mut join_set = JoinSet::new();
            for agent in targets {
                let Some(adapter) = self.adapters.get(&agent).cloned() else {
                    outcomes.push((
                        agent,
                        Err(OrchidError::MissingNode {
                            node: agent.as_str().to_string(),
                        }),
                    ));
                    continue;
                };
                let snapshot = state.clone();
                join_set.spawn(async move { (agent, adapter.process(snapshot).await) });
            }
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok((agent, result)) => outcomes.push((agent, result)),
                    Err(err) => {
                        tracing::warn!(error = %err, "supervisor sub-task panicked or was cancelled")
                    }
                }
            }
        } else {
            for agent in targets {
                let Some(adapter) = self.adapters.get(&agent) else {
                    outcomes.push((
                        agent,
                        Err(OrchidError::MissingNode {
                            node: agent.as_str().to_string(),
                        }),
                    ));
                    continue;
                };
                let result = adapter.process(state.clone()).await;
                outcomes.push((agent, result));
            }
        }

        for (agent, result) in outcomes {
            match result {
                Ok(sub_state) => {
                    if let Some(scratch) = sub_state.agent_states.get(&agent) {
                        state.agent_states.insert(agent, scratch.clone());
                    }
                    state.agent_results.insert(agent, sub_state.response_text);
                }
                Err(err) => {
                    tracing::warn!(agent = %agent, error = %err, "supervised adapter failed");
                    state
                        .agent_results
                        .insert(agent, format!("{AGENT_ERROR_MARKER} {err}"));
                }
            }
        }
        Ok(state)
    }
}

/// One LLM call judges whether the union of agent outputs covers the
/// request. An unavailable judgment degrades to "sufficient" so the turn
/// still merges instead of spinning.
pub struct ValidateNode {
    engine: Arc<DecisionEngine>,
}

impl ValidateNode {
    pub fn new(engine: Arc<DecisionEngine>) -> Self {
        Self { engine }
    }
}

#[async_trait]
impl TurnNode for ValidateNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        let validation = match self.engine.validate_coverage(&state).await {
            Ok(validation) => validation,
            Err(err) => {
                tracing::warn!(session = %state.session_id, error = %err, "supervisor validation failed, accepting current results");
                SupervisorValidation::default()
            }
        };
        if !validation.is_sufficient {
            state.supervisor_retry_count += 1;
        }
        state.supervisor_validation = Some(validation);
        Ok(state)
    }
}

pub fn route_after_validate(max_retries: u32) -> impl Fn(&ConversationState) -> &'static str {
    move |state: &ConversationState| {
        let sufficient = state
            .supervisor_validation
            .as_ref()
            .map(|validation| validation.is_sufficient)
            .unwrap_or(true);
        if sufficient || state.supervisor_retry_count > max_retries {
            node::SUPERVISOR_MERGE
        } else {
            node::SUPERVISOR_EXECUTE
        }
    }
}

/// Combines per-agent results into the final response text. Runs exactly
/// once per supervised turn, including after retry exhaustion.
pub struct MergeNode {
    engine: Arc<DecisionEngine>,
    max_retries: u32,
}

impl MergeNode {
    pub fn new(engine: Arc<DecisionEngine>, max_retries: u32) -> Self {
        Self {
            engine,
            max_retries,
        }
    }

    fn ordered_results(&self, state: &ConversationState) -> Vec<(AgentKind, String)> {
        let order = state
            .supervisor_plan
            .as_ref()
            .map(|plan| plan.agents.clone())
            .unwrap_or_default();
        let mut out = Vec::new();
        for agent in order {
            if let Some(result) = state.agent_results.get(&agent) {
                out.push((agent, result.clone()));
            }
        }
        // Anything outside the plan order (defensive) still gets included.
        for (agent, result) in &state.agent_results {
            if !out.iter().any(|(a, _)| a == agent) {
                out.push((*agent, result.clone()));
            }
        }
        out
    }
}

#[async_trait]
impl TurnNode for MergeNode {
    async fn run(
        &self,
        mut state: ConversationState,
        _trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        let validation = state.supervisor_validation.clone().unwrap_or_default();
        let results = self.ordered_results(&state);
        let sections = results
            .iter()
            .map(|(agent, result)| format!("## {}\n{}", agent.title(), result))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut merged = match validation.merge_strategy {
            MergeStrategy::Integrated => {
                let user = format!(
                    "Request: {}\n\nSpecialist answers:\n{sections}",
                    state.user_text
                );
                match self.engine.synthesize(MERGE_SYSTEM, &user).await {
                    Ok(text) if !text.trim().is_empty() => text,
                    Ok(_) | Err(_) => sections.clone(),
                }
            }
            MergeStrategy::SideBySide => sections.clone(),
            MergeStrategy::Sequential => results
                .iter()
                .enumerate()
                .map(|(index, (agent, result))| {
                    format!("{}. {}: {}", index + 1, agent.title(), result)
                })
                .collect::<Vec<_>>()
                .join("\n"),
        };

        let exhausted =
            !validation.is_sufficient && state.supervisor_retry_count > self.max_retries;
        if exhausted {
            merged.push_str(limitation_note(&state.language));
        }

        state.response_text = merged;
        state.is_complete = true;
        state.response_metadata.insert(
            "merge_strategy".into(),
            json!(format!("{:?}", validation.merge_strategy).to_lowercase()),
        );
        state
            .response_metadata
            .insert("supervised_agents".into(), json!(results.len()));
        Ok(state)
    }
}

fn limitation_note(language: &str) -> &'static str {
    if language == "en" {
        "\n\nNote: I couldn't fully cover every part of your request. Please let me know if you'd like more detail on anything."
    } else {
        "\n\n참고: 요청하신 내용을 전부 다루지 못했어요. 더 필요한 부분이 있으면 알려주세요."
    }
}
