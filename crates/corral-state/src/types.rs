//! Domain types for the Corral state store.
//!
//! These types represent the durable records the scheduler reads: jobs,
//! nodes, and the allocations that bind a job's task groups to nodes. All
//! types are serializable to/from JSON for storage in redb tables.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Unique identifier for an allocation.
pub type AllocId = String;

/// Unique identifier for a job.
pub type JobId = String;

/// Unique identifier for a node in the cluster.
pub type NodeId = String;

// ── Resources ─────────────────────────────────────────────────────

/// Resource footprint of an allocation, task, or node.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Resources {
    /// CPU in MHz.
    pub cpu: u64,
    pub memory_mb: u64,
    pub disk_mb: u64,
    pub iops: u64,
    pub networks: Vec<NetworkResource>,
}

/// Bandwidth and ports claimed on one network device.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct NetworkResource {
    pub device: String,
    pub cidr: String,
    pub ip: String,
    pub mbits: u64,
    /// Statically requested port numbers.
    pub reserved_ports: Vec<u16>,
    /// Labels of ports to be assigned dynamically.
    pub dynamic_ports: Vec<String>,
}

impl NetworkResource {
    /// Two networks are merged when they share a device and CIDR.
    pub fn same_network(&self, other: &NetworkResource) -> bool {
        self.device == other.device && self.cidr == other.cidr
    }
}

// ── Allocation ────────────────────────────────────────────────────

/// What the scheduler wants an allocation to be doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DesiredStatus {
    Run,
    Stop,
    Evict,
}

/// What the client last reported for an allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientStatus {
    Pending,
    Running,
    Failed,
    Complete,
}

/// A task group of a job bound to exactly one node.
///
/// The resource footprint never changes after creation; only the two
/// status fields move.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Allocation {
    pub id: AllocId,
    pub job_id: JobId,
    pub eval_id: String,
    pub node_id: NodeId,
    pub task_group: String,
    pub resources: Option<Resources>,
    pub desired_status: DesiredStatus,
    pub client_status: ClientStatus,
}

impl Allocation {
    /// Terminal allocations hold no resources on their node.
    pub fn is_terminal(&self) -> bool {
        self.desired_status != DesiredStatus::Run
            || matches!(
                self.client_status,
                ClientStatus::Failed | ClientStatus::Complete
            )
    }

    /// Composite key for the allocations table. A node's allocations sort
    /// together and no node id can be a prefix of another's key.
    pub fn table_key(&self) -> (&str, &str) {
        (self.node_id.as_str(), self.id.as_str())
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// Scheduling status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Initializing,
    Ready,
    Down,
}

/// A client node registered with the cluster.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Node {
    pub id: NodeId,
    pub datacenter: String,
    pub name: String,
    /// Operator-assigned class, e.g. `gpu`.
    pub node_class: String,
    /// Fingerprinted attributes, e.g. `kernel.name = linux`.
    pub attributes: HashMap<String, String>,
    /// Operator-supplied metadata.
    pub meta: HashMap<String, String>,
    /// Total capacity of the node.
    pub resources: Resources,
    /// Capacity withheld from scheduling.
    pub reserved: Option<Resources>,
    pub status: NodeStatus,
    /// Equivalence signature over class-stable attributes; 0 means none.
    #[serde(default)]
    pub computed_class: u64,
}

// ── Job ───────────────────────────────────────────────────────────

/// A placement restriction comparing a node attribute with a value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct Constraint {
    pub l_target: String,
    pub r_target: String,
    pub operand: String,
}

impl Constraint {
    pub fn new(l_target: &str, operand: &str, r_target: &str) -> Self {
        Self {
            l_target: l_target.to_string(),
            r_target: r_target.to_string(),
            operand: operand.to_string(),
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {} {}", self.l_target, self.operand, self.r_target)
    }
}

/// A unit of work submitted by a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: JobId,
    pub name: String,
    pub priority: u32,
    pub datacenters: Vec<String>,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    pub task_groups: Vec<TaskGroup>,
}

/// Tasks that must be co-located on one node.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaskGroup {
    pub name: String,
    pub count: u32,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    pub tasks: Vec<Task>,
}

/// A single unit of execution within a task group.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Task {
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub constraints: Vec<Constraint>,
    pub resources: Option<Resources>,
}
