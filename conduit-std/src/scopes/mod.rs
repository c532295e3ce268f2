//! Scope store implementations.
//!
//! Hosts normally implement [`ScopeStore`](conduit_core::ScopeStore) over
//! their own request and session objects. [`MemoryScopeStore`] is the
//! reference implementation used by tests and embedded hosts.

mod memory;

pub use memory::{MemoryScopeStore, ScopeMap, Session};
