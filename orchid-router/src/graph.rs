use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use orchid_core::{ConversationState, NullObserver, OrchidError, TraceContext, TurnObserver};

/// Terminal pseudo-node.
pub const END: &str = "__end__";

/// One step of the turn lifecycle. Nodes receive the state by value and
/// hand back the mutated state; within a turn no two nodes ever run
/// concurrently, so there is nothing to lock.
#[async_trait]
pub trait TurnNode: Send + Sync {
    async fn run(
        &self,
        state: ConversationState,
        trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError>;
}

pub enum Edge {
    To(&'static str),
    Choose(Box<dyn Fn(&ConversationState) -> &'static str + Send + Sync>),
}

pub struct GraphBuilder {
    nodes: HashMap<&'static str, Box<dyn TurnNode>>,
    edges: HashMap<&'static str, Edge>,
    entry: Option<&'static str>,
    max_steps: usize,
    observer: Arc<dyn TurnObserver>,
}

impl GraphBuilder {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
            edges: HashMap::new(),
            entry: None,
            max_steps: 25,
            observer: Arc::new(NullObserver),
        }
    }

    pub fn add_node<N>(mut self, name: &'static str, node: N) -> Self
    where
        N: TurnNode + 'static,
    {
        self.nodes.insert(name, Box::new(node));
        self
    }

    pub fn add_edge(mut self, from: &'static str, to: &'static str) -> Self {
        self.edges.insert(from, Edge::To(to));
        self
    }

    pub fn add_conditional_edge<F>(mut self, from: &'static str, choose: F) -> Self
    where
        F: Fn(&ConversationState) -> &'static str + Send + Sync + 'static,
    {
        self.edges.insert(from, Edge::Choose(Box::new(choose)));
        self
    }

    pub fn set_entry(mut self, name: &'static str) -> Self {
        self.entry = Some(name);
        self
    }

    pub fn max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Wraps every node in the timing/state-diff instrumentation at build
    /// time; instrumentation is composed here, never injected at runtime.
    pub fn build(self) -> Result<TurnGraph, OrchidError> {
        let entry = self
            .entry
            .ok_or_else(|| OrchidError::InvalidConfig("graph entry not set".into()))?;
        if !self.nodes.contains_key(entry) {
            return Err(OrchidError::MissingNode { node: entry.into() });
        }
        let nodes = self
            .nodes
            .into_iter()
            .map(|(name, inner)| {
                let timed: Box<dyn TurnNode> = Box::new(TimedNode {
                    name,
                    inner,
                    observer: self.observer.clone(),
                });
                (name, timed)
            })
            .collect();
        Ok(TurnGraph {
            nodes,
            edges: self.edges,
            entry,
            max_steps: self.max_steps,
        })
    }
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

pub struct TurnGraph {
    nodes: HashMap<&'static str, Box<dyn TurnNode>>,
    edges: HashMap<&'static str, Edge>,
    entry: &'static str,
    max_steps: usize,
}

impl TurnGraph {
    pub async fn invoke(
        &self,
        mut state: ConversationState,
        trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        let mut current = self.entry;
        let mut steps = 0usize;
        loop {
            steps += 1;
            if steps > self.max_steps {
                return Err(OrchidError::MaxStepsExceeded {
                    max: self.max_steps,
                    reached: steps,
                });
            }
            let node = self
                .nodes
                .get(current)
                .ok_or_else(|| OrchidError::MissingNode {
                    node: current.into(),
                })?;
            state = node.run(state, trace).await?;

            let next = match self.edges.get(current) {
                Some(Edge::To(next)) => *next,
                Some(Edge::Choose(choose)) => choose(&state),
                None => END,
            };
            tracing::debug!(trace = %trace.trace_id, from = current, to = next, "turn transition");
            if next == END {
                break;
            }
            current = next;
        }
        Ok(state)
    }
}

/// Timing and state-change wrapper applied to every node.
struct TimedNode {
    name: &'static str,
    inner: Box<dyn TurnNode>,
    observer: Arc<dyn TurnObserver>,
}

#[async_trait]
impl TurnNode for TimedNode {
    async fn run(
        &self,
        state: ConversationState,
        trace: &TraceContext,
    ) -> Result<ConversationState, OrchidError> {
        self.observer.on_node_enter(self.name, trace);
        let before = Snapshot::of(&state);
        let started = Instant::now();
        match self.inner.run(state, trace).await {
            Ok(state) => {
                let changed = before.diff(&state);
                self.observer
                    .on_node_exit(self.name, trace, started.elapsed(), &changed);
                Ok(state)
            }
            Err(err) => {
                self.observer.on_error(self.name, &err);
                Err(err)
            }
        }
    }
}

/// Cheap field fingerprint used to report which parts of the state a node
/// touched. Observability only; routing never reads this.
struct Snapshot {
    current_agent: orchid_core::AgentKind,
    handoff_count: u32,
    pending_handoff: bool,
    needs_user_input: bool,
    is_escalated: bool,
    is_complete: bool,
    response_text: String,
    error_message: Option<String>,
    history_len: usize,
    decisions: [bool; 5],
    agent_results_len: usize,
}

impl Snapshot {
    fn of(state: &ConversationState) -> Self {
        Self {
            current_agent: state.current_agent,
            handoff_count: state.handoff_count,
            pending_handoff: state.pending_handoff.is_some(),
            needs_user_input: state.needs_user_input,
            is_escalated: state.is_escalated,
            is_complete: state.is_complete,
            response_text: state.response_text.clone(),
            error_message: state.error_message.clone(),
            history_len: state.history.len(),
            decisions: [
                state.intent_decision.is_some(),
                state.agent_decision.is_some(),
                state.handoff_decision.is_some(),
                state.completeness_decision.is_some(),
                state.next_step_decision.is_some(),
            ],
            agent_results_len: state.agent_results.len(),
        }
    }

    fn diff(&self, after: &ConversationState) -> Vec<&'static str> {
        let now = Snapshot::of(after);
        let mut changed = Vec::new();
        if self.current_agent != now.current_agent {
            changed.push("current_agent");
        }
        if self.handoff_count != now.handoff_count {
            changed.push("handoff_count");
        }
        if self.pending_handoff != now.pending_handoff {
            changed.push("pending_handoff");
        }
        if self.needs_user_input != now.needs_user_input {
            changed.push("needs_user_input");
        }
        if self.is_escalated != now.is_escalated {
            changed.push("is_escalated");
        }
        if self.is_complete != now.is_complete {
            changed.push("is_complete");
        }
        if self.response_text != now.response_text {
            changed.push("response_text");
        }
        if self.error_message != now.error_message {
            changed.push("error_message");
        }
        if self.history_len != now.history_len {
            changed.push("history");
        }
        if self.decisions != now.decisions {
            changed.push("decisions");
        }
        if self.agent_results_len != now.agent_results_len {
            changed.push("agent_results");
        }
        changed
    }
}
