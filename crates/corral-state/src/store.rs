//! StateStore: redb-backed state persistence for Corral.
//!
//! Provides typed CRUD operations over allocations, nodes, and jobs. All
//! values are JSON-serialized into redb's `&[u8]` value columns. The store
//! supports both on-disk and in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use corral_core::StateConfig;
use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Open the store at the path named in the `[state]` config section.
    pub fn open_from_config(config: &StateConfig) -> StateResult<Self> {
        Self::open(&config.path)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(ALLOCS).map_err(map_err!(Table))?;
        txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
        txn.open_table(NODES).map_err(map_err!(Table))?;
        txn.open_table(JOBS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Allocations ────────────────────────────────────────────────

    /// Insert or update a batch of allocations in one transaction.
    ///
    /// An allocation that moved nodes has its old record removed.
    pub fn upsert_allocs(&self, allocs: &[Allocation]) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(ALLOCS).map_err(map_err!(Table))?;
            let mut index = txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
            for alloc in allocs {
                let previous_node = index
                    .get(alloc.id.as_str())
                    .map_err(map_err!(Read))?
                    .map(|guard| guard.value().to_string());
                if let Some(previous_node) = previous_node
                    && previous_node != alloc.node_id
                {
                    table
                        .remove((previous_node.as_str(), alloc.id.as_str()))
                        .map_err(map_err!(Write))?;
                }

                let value = serde_json::to_vec(alloc).map_err(map_err!(Serialize))?;
                table
                    .insert(alloc.table_key(), value.as_slice())
                    .map_err(map_err!(Write))?;
                index
                    .insert(alloc.id.as_str(), alloc.node_id.as_str())
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(count = allocs.len(), "allocations stored");
        Ok(())
    }

    /// Get an allocation by ID.
    pub fn get_alloc(&self, alloc_id: &str) -> StateResult<Option<Allocation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let index = txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
        let Some(node_id) = index
            .get(alloc_id)
            .map_err(map_err!(Read))?
            .map(|guard| guard.value().to_string())
        else {
            return Ok(None);
        };

        let table = txn.open_table(ALLOCS).map_err(map_err!(Table))?;
        match table
            .get((node_id.as_str(), alloc_id))
            .map_err(map_err!(Read))?
        {
            Some(guard) => {
                let alloc: Allocation =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(alloc))
            }
            // The index points at a record that is gone.
            None => Err(StateError::NotFound(format!("{node_id}/{alloc_id}"))),
        }
    }

    /// List every allocation recorded for a node, terminal ones included.
    pub fn allocs_by_node(&self, node_id: &str) -> StateResult<Vec<Allocation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ALLOCS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.range((node_id, "")..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if key.value().0 != node_id {
                break;
            }
            let alloc: Allocation =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(alloc);
        }
        Ok(results)
    }

    /// List every allocation belonging to a job.
    pub fn allocs_by_job(&self, job_id: &str) -> StateResult<Vec<Allocation>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(ALLOCS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let alloc: Allocation =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            if alloc.job_id == job_id {
                results.push(alloc);
            }
        }
        Ok(results)
    }

    /// Delete an allocation by ID. Returns true if it existed.
    pub fn delete_alloc(&self, alloc_id: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut index = txn.open_table(ALLOC_INDEX).map_err(map_err!(Table))?;
            let node_id = index
                .remove(alloc_id)
                .map_err(map_err!(Write))?
                .map(|guard| guard.value().to_string());
            existed = node_id.is_some();
            if let Some(node_id) = node_id {
                let mut table = txn.open_table(ALLOCS).map_err(map_err!(Table))?;
                table
                    .remove((node_id.as_str(), alloc_id))
                    .map_err(map_err!(Write))?;
            }
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%alloc_id, existed, "allocation deleted");
        Ok(existed)
    }

    // ── Nodes ──────────────────────────────────────────────────────

    /// Insert or update a node.
    pub fn put_node(&self, node: &Node) -> StateResult<()> {
        let value = serde_json::to_vec(node).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(NODES).map_err(map_err!(Table))?;
            table
                .insert(node.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    /// Get a node by ID.
    pub fn get_node(&self, node_id: &str) -> StateResult<Option<Node>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        match table.get(node_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let node: Node =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(node))
            }
            None => Ok(None),
        }
    }

    /// List all nodes.
    pub fn list_nodes(&self) -> StateResult<Vec<Node>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(NODES).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (_, value) = entry.map_err(map_err!(Read))?;
            let node: Node =
                serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(node);
        }
        Ok(results)
    }

    // ── Jobs ───────────────────────────────────────────────────────

    /// Insert or update a job.
    pub fn put_job(&self, job: &Job) -> StateResult<()> {
        let value = serde_json::to_vec(job).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(JOBS).map_err(map_err!(Table))?;
            table
                .insert(job.id.as_str(), value.as_slice())
                .map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(job_id = %job.id, "job stored");
        Ok(())
    }

    /// Get a job by ID.
    pub fn get_job(&self, job_id: &str) -> StateResult<Option<Job>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(JOBS).map_err(map_err!(Table))?;
        match table.get(job_id).map_err(map_err!(Read))? {
            Some(guard) => {
                let job: Job =
                    serde_json::from_slice(guard.value()).map_err(map_err!(Deserialize))?;
                Ok(Some(job))
            }
            None => Ok(None),
        }
    }
}
