use std::collections::HashMap;
use std::sync::Arc;

use orchid_core::{
    AgentAdapter, AgentKind, DecisionCache, LlmCaller, NullObserver, OrchidError, SessionStore,
    TurnObserver,
};

use crate::config::RouterConfig;
use crate::engine::DecisionEngine;
use crate::graph::{GraphBuilder, TurnGraph, END};
use crate::loop_guard::LoopGuard;
use crate::nodes::{
    agent_node_name, node, route_after_agent, route_after_router, AgentNode, DispatchNode,
    IngestNode, ProfileSource, RespondNode, RouteNode, UnknownNode,
};
use crate::service::ChatService;
use crate::supervisor::{
    route_after_plan, route_after_validate, ExecuteNode, MergeNode, PlanNode, ValidateNode,
};

/// Assembles the turn graph from an LLM caller, a session store, and the
/// registered domain adapters. The wiring is fixed; only the participants
/// vary.
pub struct OrchestratorBuilder {
    llm: Option<Arc<dyn LlmCaller>>,
    store: Option<Arc<dyn SessionStore>>,
    cache: Option<Arc<dyn DecisionCache>>,
    observer: Arc<dyn TurnObserver>,
    adapters: HashMap<AgentKind, Arc<dyn AgentAdapter>>,
    profiles: Option<Arc<dyn ProfileSource>>,
    config: RouterConfig,
}

impl OrchestratorBuilder {
    pub fn new() -> Self {
        Self {
            llm: None,
            store: None,
            cache: None,
            observer: Arc::new(NullObserver),
            adapters: HashMap::new(),
            profiles: None,
            config: RouterConfig::default(),
        }
    }

    pub fn llm(mut self, llm: Arc<dyn LlmCaller>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn store(mut self, store: Arc<dyn SessionStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn cache(mut self, cache: Arc<dyn DecisionCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn observer(mut self, observer: Arc<dyn TurnObserver>) -> Self {
        self.observer = observer;
        self
    }

    pub fn adapter(mut self, adapter: Arc<dyn AgentAdapter>) -> Self {
        self.adapters.insert(adapter.kind(), adapter);
        self
    }

    pub fn profiles(mut self, profiles: Arc<dyn ProfileSource>) -> Self {
        self.profiles = Some(profiles);
        self
    }

    pub fn config(mut self, config: RouterConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Result<ChatService, OrchidError> {
        let store = self
            .store
            .clone()
            .ok_or_else(|| OrchidError::InvalidConfig("session store not set".into()))?;
        let config = self.config.clone();
        let graph = self.build_graph()?;
        Ok(ChatService::new(graph, store, config))
    }

    pub fn build_graph(self) -> Result<TurnGraph, OrchidError> {
        let llm = self
            .llm
            .ok_or_else(|| OrchidError::InvalidConfig("llm caller not set".into()))?;
        let store = self
            .store
            .ok_or_else(|| OrchidError::InvalidConfig("session store not set".into()))?;
        if self.adapters.is_empty() {
            return Err(OrchidError::InvalidConfig(
                "no domain adapters registered".into(),
            ));
        }

        let mut engine =
            DecisionEngine::new(llm, self.config.clone()).with_observer(self.observer.clone());
        if let Some(cache) = self.cache.clone() {
            engine = engine.with_cache(cache);
        }
        let engine = Arc::new(engine);
        let guard = LoopGuard::new(self.config.handoff_threshold);

        let mut builder = GraphBuilder::new()
            .set_entry(node::INGEST)
            .max_steps(self.config.max_steps)
            .observer(self.observer.clone())
            .add_node(node::INGEST, IngestNode::new(self.profiles.clone()))
            .add_node(node::ROUTE, RouteNode::new(engine.clone()))
            .add_node(node::DISPATCH, DispatchNode)
            .add_node(node::UNKNOWN, UnknownNode)
            .add_node(
                node::RESPOND,
                RespondNode::new(store.clone(), self.observer.clone()),
            )
            .add_node(node::SUPERVISOR_PLAN, PlanNode::new(engine.clone()))
            .add_node(
                node::SUPERVISOR_EXECUTE,
                ExecuteNode::new(self.adapters.clone()),
            )
            .add_node(node::SUPERVISOR_VALIDATE, ValidateNode::new(engine.clone()))
            .add_node(
                node::SUPERVISOR_MERGE,
                MergeNode::new(engine.clone(), self.config.supervisor_max_retries),
            );

        for (kind, adapter) in &self.adapters {
            builder = builder.add_node(
                agent_node_name(*kind),
                AgentNode::new(adapter.clone(), self.cache.clone(), guard.clone()),
            );
        }

        builder = builder
            .add_edge(node::INGEST, node::ROUTE)
            .add_conditional_edge(node::ROUTE, route_after_router)
            // A dispatchable agent nobody registered is a wiring defect;
            // the graph surfaces it as MissingNode.
            .add_conditional_edge(node::DISPATCH, |state| {
                agent_node_name(state.current_agent)
            })
            .add_conditional_edge(node::SUPERVISOR_PLAN, route_after_plan)
            .add_edge(node::SUPERVISOR_EXECUTE, node::SUPERVISOR_VALIDATE)
            .add_conditional_edge(
                node::SUPERVISOR_VALIDATE,
                route_after_validate(self.config.supervisor_max_retries),
            )
            .add_edge(node::SUPERVISOR_MERGE, node::RESPOND)
            .add_edge(node::UNKNOWN, node::RESPOND)
            .add_edge(node::RESPOND, END);

        for kind in self.adapters.keys() {
            builder = builder.add_conditional_edge(agent_node_name(*kind), route_after_agent);
        }

        builder.build()
    }
}

impl Default for OrchestratorBuilder {
    fn default() -> Self {
        Self::new()
    }
}
