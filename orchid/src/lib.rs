//! Umbrella crate re-exporting the conversation routing engine.
//!
//! - [`core`] — state, decision records, capability traits, errors
//! - [`router`] — the decision engine, turn graph, and chat service
//! - [`store`] — in-memory and file-backed cache/session implementations
//!
//! ```no_run
//! use std::sync::Arc;
//! use orchid::router::OrchestratorBuilder;
//! use orchid::store::{MemoryCache, MemorySessionStore};
//!
//! # async fn run(llm: Arc<dyn orchid::core::LlmCaller>, adapter: Arc<dyn orchid::core::AgentAdapter>) -> Result<(), orchid::core::OrchidError> {
//! let service = OrchestratorBuilder::new()
//!     .llm(llm)
//!     .store(Arc::new(MemorySessionStore::new()))
//!     .cache(Arc::new(MemoryCache::default()))
//!     .adapter(adapter)
//!     .build()?;
//! let reply = service.process_message("session-1", "내 피부에 뭐가 좋을까요?").await?;
//! println!("{} -> {}", reply.agent, reply.response);
//! # Ok(())
//! # }
//! ```

pub use orchid_core as core;
pub use orchid_router as router;
#[cfg(feature = "store")]
pub use orchid_store as store;

pub use orchid_core::{
    AgentAdapter, AgentKind, ConversationState, Intent, LlmCaller, OrchidError, SessionStore,
};
pub use orchid_router::{ChatService, OrchestratorBuilder, RouterConfig, TurnReply};
