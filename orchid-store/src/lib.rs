//! Dev and test backends for the orchid cache and session-store
//! capabilities: an in-memory TTL cache, an in-memory session store, and a
//! JSONL file store with checkpoint history.

mod file;
mod memory;
mod session;

pub use file::{CheckpointRecord, FileSessionStore};
pub use memory::{CacheStats, MemoryCache};
pub use session::MemorySessionStore;
