pub mod attribute;
pub mod config;

pub use attribute::{AttributeClass, AttributeRegistry, AttributeTarget, UnknownAttributePolicy};
pub use config::{CorralConfig, StateConfig, WorkerConfig};
