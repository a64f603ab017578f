//! Graph-side of the pipeline: schema, the store adapter interface, the
//! shipped adapters, batch planning, and the builder passes.

pub mod builder;
pub mod cypher;
pub mod memory;
pub mod planner;
pub mod schema;
pub mod store;

pub use memory::MemoryGraph;
pub use schema::{EdgeType, NodeLabel};
pub use store::{GraphStore, MutationBatch};
