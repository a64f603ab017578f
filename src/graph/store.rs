//! The Graph Store Adapter: the narrow write-oriented interface the
//! pipeline sees instead of a concrete graph database.
//!
//! Batches are structured rather than raw query text so the planner's
//! grouping and batch sizing survive the interface: an adapter backed by a
//! Cypher server renders them via [`crate::graph::cypher`]; the in-memory
//! adapter interprets them directly.

use super::schema::{ConstraintSpec, EdgeType, NodeLabel};
use anyhow::Result;
use serde_json::Value;

pub type Properties = serde_json::Map<String, Value>;

/// MERGE-style idempotent writes vs CREATE-style duplicating writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteSemantics {
    Create,
    Merge,
}

/// One node keyed by its label's key property.
#[derive(Debug, Clone)]
pub struct NodeRow {
    pub key: String,
    pub props: Properties,
}

/// A batch of nodes of one label. Node writes always merge on the key.
#[derive(Debug, Clone)]
pub struct NodeBatch {
    pub label: NodeLabel,
    /// Secondary label, e.g. the project node is `PROJECT:FOLDER`.
    pub extra_label: Option<NodeLabel>,
    pub rows: Vec<NodeRow>,
}

/// One edge between two keyed endpoints.
#[derive(Debug, Clone)]
pub struct EdgeRow {
    pub from_key: String,
    pub to_key: String,
    pub props: Properties,
}

/// A flat edge batch executed as a single UNWIND mutation, single-threaded
/// on the server.
#[derive(Debug, Clone)]
pub struct EdgeBatch {
    pub edge_type: EdgeType,
    pub from: NodeLabel,
    pub to: NodeLabel,
    pub semantics: WriteSemantics,
    pub rows: Vec<EdgeRow>,
}

/// Edges sharing one write-locked endpoint. A group is never split across
/// submissions, so two server workers can never contend on its endpoint.
#[derive(Debug, Clone)]
pub struct EdgeGroup {
    pub key: String,
    pub rows: Vec<EdgeRow>,
}

/// An edge batch executed by the server-side iteration procedure, one group
/// at a time, parallelised across groups.
#[derive(Debug, Clone)]
pub struct GroupedEdgeBatch {
    pub edge_type: EdgeType,
    pub from: NodeLabel,
    pub to: NodeLabel,
    pub semantics: WriteSemantics,
    /// Groups committed per server-side transaction.
    pub server_batch_size: usize,
    pub groups: Vec<EdgeGroup>,
}

impl GroupedEdgeBatch {
    pub fn edge_count(&self) -> usize {
        self.groups.iter().map(|g| g.rows.len()).sum()
    }
}

/// One submission to the store.
#[derive(Debug, Clone)]
pub enum MutationBatch {
    Nodes(NodeBatch),
    Edges(EdgeBatch),
    GroupedEdges(GroupedEdgeBatch),
    /// Detach-delete every node with total degree zero.
    DeleteOrphans,
}

impl MutationBatch {
    /// Items in the batch, for progress reporting.
    pub fn len(&self) -> usize {
        match self {
            MutationBatch::Nodes(b) => b.rows.len(),
            MutationBatch::Edges(b) => b.rows.len(),
            MutationBatch::GroupedEdges(b) => b.edge_count(),
            MutationBatch::DeleteOrphans => 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MutationBatch::DeleteOrphans => false,
            other => other.len() == 0,
        }
    }
}

/// Returned by server-backed adapters when a mutation misses its per-call
/// deadline. Fatal: the pass fails and the run aborts; the caller is
/// expected to reset and retry.
#[derive(Debug, thiserror::Error)]
#[error("graph mutation exceeded its {timeout_ms} ms deadline")]
pub struct IngestTimeout {
    pub timeout_ms: u64,
}

/// Counters reported back from one submission.
#[derive(Debug, Default, Clone, Copy)]
pub struct WriteSummary {
    pub nodes_written: usize,
    pub edges_written: usize,
    pub nodes_deleted: usize,
}

/// Read queries. Only orphan cleanup and the run summary need reads.
#[derive(Debug, Clone, Copy)]
pub enum GraphQuery {
    NodeCount { label: Option<NodeLabel> },
    EdgeCount { edge_type: Option<EdgeType> },
    OrphanCount,
}

/// Minimal write-oriented interface over the graph database.
///
/// Mutations are subject to the adapter's own per-call deadline; an adapter
/// that cannot finish a submission in time fails the call with
/// [`IngestTimeout`], which fails the pass and the run.
pub trait GraphStore {
    /// Clear all nodes and edges.
    fn reset(&self) -> Result<()>;

    /// Ensure uniqueness constraints on `(label, key property)`.
    fn ensure_constraints(&self, specs: &[ConstraintSpec]) -> Result<()>;

    /// Execute one mutation batch.
    fn submit(&self, batch: &MutationBatch) -> Result<WriteSummary>;

    /// Run a read query, one JSON value per row.
    fn query(&self, query: &GraphQuery) -> Result<Vec<Value>>;

    /// Vector index for the downstream summarisation stage; unused by the
    /// core passes.
    fn create_vector_index(&self, label: NodeLabel, property: &str, dims: usize) -> Result<()>;
}
