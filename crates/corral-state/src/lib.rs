//! corral-state: durable state store for Corral.
//!
//! Backed by [redb](https://docs.rs/redb), holds the committed allocations,
//! nodes, and jobs the scheduler reasons about.
//!
//! # Architecture
//!
//! All domain types are JSON-serialized into redb's `&[u8]` value columns.
//! Allocations are keyed `(node_id, alloc_id)` so that a node's allocations
//! are a single range, with a secondary `alloc_id -> node_id` index.
//!
//! The `StateStore` is `Clone` + `Send` + `Sync` (backed by `Arc<Database>`)
//! and can be shared across concurrent evaluations. The scheduler only sees
//! it through the [`AllocationSource`] read seam.

pub mod error;
pub mod source;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use source::AllocationSource;
pub use store::StateStore;
pub use types::*;
