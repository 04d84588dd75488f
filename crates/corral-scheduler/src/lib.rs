//! corral-scheduler: the allocation-evaluation core of the Corral scheduler.
//!
//! For one evaluation of one job, this crate answers two questions about a
//! candidate node: what would be running there if the plan built so far were
//! committed, and is the job (or one of its task groups) eligible on nodes
//! of this computed class at all. It never writes durable state.
//!
//! # Components
//!
//! - **`resources`**: Summing allocation footprints, port collision checks
//! - **`plan`**: The speculative evictions and placements of one evaluation
//! - **`context`**: `EvalContext`: state handle, plan, caches, `proposed_allocs`
//! - **`escape`**: Which constraints defeat class-based caching
//! - **`eligibility`**: Per-evaluation job/task-group eligibility by class
//! - **`class`**: Computed node class signatures
//! - **`feasible`**: Constraint and driver checkers, class-aware wrapper
//! - **`fit`**: Whether proposed allocations fit a node's capacity
//! - **`metrics`**: Per-placement filtering and exhaustion counters
//! - **`rank`**: `RankedNode`, the unit handed to the scoring layer
//! - **`worker`**: Runs one evaluation under a deadline
//!
//! # Architecture
//!
//! ```text
//! EvalWorker (tokio, deadline)
//!   └── EvalContext (one per evaluation, single owner)
//!       ├── AllocationSource (durable state, read-only)
//!       ├── Plan (append-only)
//!       ├── EvalEligibility ── EscapeAnalyzer ── AttributeRegistry
//!       ├── MatchCache (compiled regexes, version requirements)
//!       └── AllocMetric
//! ```

pub mod class;
pub mod context;
pub mod eligibility;
pub mod error;
pub mod escape;
pub mod feasible;
pub mod fit;
pub mod metrics;
pub mod plan;
pub mod rank;
pub mod resources;
pub mod worker;

pub use class::{ComputedClass, compute_class};
pub use context::{EvalContext, MatchCache};
pub use eligibility::{ClassEligibility, EvalEligibility};
pub use error::{EvalError, EvalResult};
pub use escape::EscapeAnalyzer;
pub use feasible::{ConstraintChecker, DriverChecker, FeasibilityChecker, FeasibilityWrapper};
pub use fit::{FitOutcome, allocs_fit};
pub use metrics::AllocMetric;
pub use plan::Plan;
pub use rank::RankedNode;
pub use resources::{ports_collide, sum_allocs};
pub use worker::EvalWorker;
