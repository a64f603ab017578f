//! In-memory graph store backed by petgraph.
//!
//! Interprets the same mutation batches a server-backed adapter would
//! render to Cypher, honouring merge vs create semantics, so pipelines and
//! tests run without a database process.

use super::schema::{ConstraintSpec, EdgeType, NodeLabel};
use super::store::{
    EdgeRow, GraphQuery, GraphStore, MutationBatch, NodeBatch, Properties, WriteSemantics,
    WriteSummary,
};
use anyhow::Result;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::RwLock;

#[derive(Debug, Clone)]
struct MemoryNode {
    label: NodeLabel,
    extra_label: Option<NodeLabel>,
    key: String,
    props: Properties,
}

#[derive(Debug, Clone)]
struct MemoryEdge {
    edge_type: EdgeType,
    props: Properties,
}

/// Pure in-memory adapter.
pub struct MemoryGraph {
    graph: RwLock<DiGraph<MemoryNode, MemoryEdge>>,
    /// `(label name, key value)` → node. Nodes with a secondary label are
    /// indexed under both labels.
    index: RwLock<HashMap<(&'static str, String), NodeIndex>>,
}

impl MemoryGraph {
    pub fn new() -> Self {
        Self {
            graph: RwLock::new(DiGraph::new()),
            index: RwLock::new(HashMap::new()),
        }
    }

    // RwLock poisoning means a writer panicked mid-update; nothing can be
    // recovered from that state.
    fn read_graph(&self) -> std::sync::RwLockReadGuard<'_, DiGraph<MemoryNode, MemoryEdge>> {
        self.graph.read().expect("graph lock poisoned")
    }

    fn write_graph(&self) -> std::sync::RwLockWriteGuard<'_, DiGraph<MemoryNode, MemoryEdge>> {
        self.graph.write().expect("graph lock poisoned")
    }

    fn apply_nodes(&self, batch: &NodeBatch) -> WriteSummary {
        let mut graph = self.write_graph();
        let mut index = self.index.write().expect("index lock poisoned");
        let mut written = 0;

        for row in &batch.rows {
            let slot = (batch.label.as_str(), row.key.clone());
            if let Some(&idx) = index.get(&slot) {
                // Merge: SET n += props on the existing node.
                if let Some(node) = graph.node_weight_mut(idx) {
                    for (k, v) in &row.props {
                        node.props.insert(k.clone(), v.clone());
                    }
                }
            } else {
                let idx = graph.add_node(MemoryNode {
                    label: batch.label,
                    extra_label: batch.extra_label,
                    key: row.key.clone(),
                    props: row.props.clone(),
                });
                index.insert(slot, idx);
                if let Some(extra) = batch.extra_label {
                    index.insert((extra.as_str(), row.key.clone()), idx);
                }
                written += 1;
            }
        }

        WriteSummary {
            nodes_written: written,
            ..Default::default()
        }
    }

    fn apply_edge_rows(
        &self,
        edge_type: EdgeType,
        from: NodeLabel,
        to: NodeLabel,
        semantics: WriteSemantics,
        rows: &[EdgeRow],
    ) -> WriteSummary {
        let mut graph = self.write_graph();
        let index = self.index.read().expect("index lock poisoned");
        let mut written = 0;

        for row in rows {
            let from_idx = index.get(&(from.as_str(), row.from_key.clone()));
            let to_idx = index.get(&(to.as_str(), row.to_key.clone()));
            // MATCH semantics: a missing endpoint matches nothing and the
            // row writes nothing.
            let (Some(&a), Some(&b)) = (from_idx, to_idx) else {
                continue;
            };

            if semantics == WriteSemantics::Merge {
                let existing = graph
                    .edges_connecting(a, b)
                    .find(|e| e.weight().edge_type == edge_type)
                    .map(|e| e.id());
                if let Some(edge_id) = existing {
                    if let Some(edge) = graph.edge_weight_mut(edge_id) {
                        for (k, v) in &row.props {
                            edge.props.insert(k.clone(), v.clone());
                        }
                    }
                    continue;
                }
            }

            graph.add_edge(
                a,
                b,
                MemoryEdge {
                    edge_type,
                    props: row.props.clone(),
                },
            );
            written += 1;
        }

        WriteSummary {
            edges_written: written,
            ..Default::default()
        }
    }

    fn delete_orphans(&self) -> WriteSummary {
        let mut graph = self.write_graph();
        let mut index = self.index.write().expect("index lock poisoned");

        let orphans: Vec<NodeIndex> = graph
            .node_indices()
            .filter(|&idx| graph.neighbors_undirected(idx).next().is_none())
            .collect();
        let deleted = orphans.len();

        // Removal invalidates indices, so rebuild the key index afterwards.
        for idx in orphans.into_iter().rev() {
            graph.remove_node(idx);
        }
        index.clear();
        for idx in graph.node_indices() {
            let node = &graph[idx];
            index.insert((node.label.as_str(), node.key.clone()), idx);
            if let Some(extra) = node.extra_label {
                index.insert((extra.as_str(), node.key.clone()), idx);
            }
        }

        WriteSummary {
            nodes_deleted: deleted,
            ..Default::default()
        }
    }

    // ---- read helpers used by the CLI summary and the tests ----

    pub fn node_count(&self) -> usize {
        self.read_graph().node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.read_graph().edge_count()
    }

    pub fn node_exists(&self, label: NodeLabel, key: &str) -> bool {
        self.index
            .read()
            .expect("index lock poisoned")
            .contains_key(&(label.as_str(), key.to_string()))
    }

    pub fn node_keys(&self, label: NodeLabel) -> Vec<String> {
        let graph = self.read_graph();
        graph
            .node_weights()
            .filter(|n| n.label == label || n.extra_label == Some(label))
            .map(|n| n.key.clone())
            .collect()
    }

    pub fn node_props(&self, label: NodeLabel, key: &str) -> Option<Properties> {
        let index = self.index.read().expect("index lock poisoned");
        let graph = self.read_graph();
        index
            .get(&(label.as_str(), key.to_string()))
            .and_then(|&idx| graph.node_weight(idx))
            .map(|n| n.props.clone())
    }

    /// All `(from key, to key)` pairs of one edge type.
    pub fn edges_of_type(&self, edge_type: EdgeType) -> Vec<(String, String)> {
        let graph = self.read_graph();
        graph
            .edge_references()
            .filter(|e| e.weight().edge_type == edge_type)
            .map(|e| {
                (
                    graph[e.source()].key.clone(),
                    graph[e.target()].key.clone(),
                )
            })
            .collect()
    }

    pub fn edge_count_between(
        &self,
        edge_type: EdgeType,
        from: (NodeLabel, &str),
        to: (NodeLabel, &str),
    ) -> usize {
        let index = self.index.read().expect("index lock poisoned");
        let graph = self.read_graph();
        let (Some(&a), Some(&b)) = (
            index.get(&(from.0.as_str(), from.1.to_string())),
            index.get(&(to.0.as_str(), to.1.to_string())),
        ) else {
            return 0;
        };
        graph
            .edges_connecting(a, b)
            .filter(|e| e.weight().edge_type == edge_type)
            .count()
    }

    /// Per-label node counts plus totals.
    pub fn stats(&self) -> HashMap<String, i64> {
        let graph = self.read_graph();
        let mut stats: HashMap<String, i64> = HashMap::new();
        for node in graph.node_weights() {
            *stats.entry(node.label.as_str().to_string()).or_insert(0) += 1;
        }
        stats.insert("total_nodes".into(), graph.node_count() as i64);
        stats.insert("total_edges".into(), graph.edge_count() as i64);
        stats
    }
}

impl Default for MemoryGraph {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphStore for MemoryGraph {
    fn reset(&self) -> Result<()> {
        self.write_graph().clear();
        self.index.write().expect("index lock poisoned").clear();
        Ok(())
    }

    fn ensure_constraints(&self, _specs: &[ConstraintSpec]) -> Result<()> {
        // Uniqueness on (label, key) is inherent to the key index.
        Ok(())
    }

    fn submit(&self, batch: &MutationBatch) -> Result<WriteSummary> {
        let summary = match batch {
            MutationBatch::Nodes(nodes) => self.apply_nodes(nodes),
            MutationBatch::Edges(edges) => self.apply_edge_rows(
                edges.edge_type,
                edges.from,
                edges.to,
                edges.semantics,
                &edges.rows,
            ),
            MutationBatch::GroupedEdges(grouped) => {
                let mut summary = WriteSummary::default();
                for group in &grouped.groups {
                    let s = self.apply_edge_rows(
                        grouped.edge_type,
                        grouped.from,
                        grouped.to,
                        grouped.semantics,
                        &group.rows,
                    );
                    summary.edges_written += s.edges_written;
                }
                summary
            }
            MutationBatch::DeleteOrphans => self.delete_orphans(),
        };
        Ok(summary)
    }

    fn query(&self, query: &GraphQuery) -> Result<Vec<Value>> {
        let graph = self.read_graph();
        let count = match query {
            GraphQuery::NodeCount { label: None } => graph.node_count(),
            GraphQuery::NodeCount { label: Some(l) } => graph
                .node_weights()
                .filter(|n| n.label == *l || n.extra_label == Some(*l))
                .count(),
            GraphQuery::EdgeCount { edge_type: None } => graph.edge_count(),
            GraphQuery::EdgeCount { edge_type: Some(t) } => graph
                .edge_references()
                .filter(|e| e.weight().edge_type == *t)
                .count(),
            GraphQuery::OrphanCount => graph
                .node_indices()
                .filter(|&idx| graph.neighbors_undirected(idx).next().is_none())
                .count(),
        };
        Ok(vec![json!(count)])
    }

    fn create_vector_index(&self, _label: NodeLabel, _property: &str, _dims: usize) -> Result<()> {
        Ok(())
    }
}
