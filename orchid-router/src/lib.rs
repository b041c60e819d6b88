//! Conversational routing and execution engine.
//!
//! A turn flows through a small node graph: ingest the message, decide who
//! should answer (with as few LLM judgment calls as the situation allows),
//! dispatch to a domain adapter or fan out through the supervisor, then
//! persist and respond. Hand-offs between agents are user-confirmed and
//! bounded by a loop guard.

pub mod builder;
pub mod config;
pub mod engine;
pub mod graph;
pub mod loop_guard;
pub mod nodes;
pub mod service;
pub mod supervisor;

pub use builder::OrchestratorBuilder;
pub use config::RouterConfig;
pub use engine::{DecisionEngine, RoutedState};
pub use graph::{GraphBuilder, TurnGraph, TurnNode, END};
pub use loop_guard::{GuardOutcome, LoopGuard, ESCALATION_MESSAGE_EN, ESCALATION_MESSAGE_KO};
pub use nodes::{agent_node_name, node, ProfileSource};
pub use service::{ChatService, TurnReply};
