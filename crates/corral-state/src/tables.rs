//! redb table definitions for the Corral state store.
//!
//! Tables use `&str` keys, except allocations which use a `(node_id,
//! alloc_id)` tuple. Values are JSON-serialized domain types, except for the
//! allocation index which maps an allocation id to its node.

use redb::TableDefinition;

/// Allocations keyed by `(node_id, alloc_id)`.
pub const ALLOCS: TableDefinition<(&str, &str), &[u8]> = TableDefinition::new("allocs");

/// `{alloc_id}` → `{node_id}`.
pub const ALLOC_INDEX: TableDefinition<&str, &str> = TableDefinition::new("alloc_index");

/// Node records keyed by `{node_id}`.
pub const NODES: TableDefinition<&str, &[u8]> = TableDefinition::new("nodes");

/// Job records keyed by `{job_id}`.
pub const JOBS: TableDefinition<&str, &[u8]> = TableDefinition::new("jobs");
