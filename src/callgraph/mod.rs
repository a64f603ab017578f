//! Call-graph extraction: caller → callee resolution for every call-site
//! reference, and planning of the CALLS edge batches.
//!
//! Two interchangeable strategies exist behind [`CallExtractor`]. The
//! Container strategy reads caller provenance straight off the reference
//! records; the Spatial strategy reconstructs it by locating each call site
//! inside a function body span. Selection is driven by the
//! `has_container_field` flag the parser computed.

pub mod container;
pub mod spatial;

use crate::graph::planner::{self, BatchingConfig, EdgeStrategy, PlannedEdge};
use crate::graph::store::{MutationBatch, Properties};
use crate::graph::{EdgeType, NodeLabel};
use crate::models::{CallRelation, SymbolGraph};
use crate::paths::ProjectPaths;
use serde_json::json;

pub use container::ContainerExtractor;
pub use spatial::{attach_spans, SpanMatchStats, SpatialExtractor};

/// Drop counters from one extraction run.
#[derive(Debug, Default, Clone, Copy)]
pub struct CallStats {
    /// Container pointed at an id outside the indexed set.
    pub unresolved_containers: usize,
    /// Container resolved to a non-function symbol (data error).
    pub non_function_callers: usize,
    /// Call site fell outside every known function body.
    pub outside_any_body: usize,
}

#[derive(Debug, Default)]
pub struct Extraction {
    pub relations: Vec<CallRelation>,
    pub stats: CallStats,
}

/// A caller→callee resolution strategy.
pub trait CallExtractor {
    fn strategy_name(&self) -> &'static str;

    fn extract(&self, graph: &SymbolGraph) -> Extraction;
}

/// Deterministic ordering for batch contents, independent of map iteration
/// order and worker count.
pub fn sort_relations(relations: &mut [CallRelation]) {
    relations.sort_by(|a, b| {
        (a.caller, a.callee, &a.site.file_uri, a.site.line, a.site.column).cmp(&(
            b.caller,
            b.callee,
            &b.site.file_uri,
            b.site.line,
            b.site.column,
        ))
    });
}

/// Plan the CALLS edge pass. The grouping key for the parallel strategies
/// is the caller file (the call site's file).
pub fn plan_call_batches(
    relations: &[CallRelation],
    paths: &ProjectPaths,
    strategy: EdgeStrategy,
    config: &BatchingConfig,
) -> Vec<MutationBatch> {
    let edges: Vec<PlannedEdge> = relations
        .iter()
        .map(|relation| {
            let file = paths
                .uri_to_rel(&relation.site.file_uri)
                .map(|rel| ProjectPaths::rel_str(&rel))
                .unwrap_or_else(|_| relation.site.file_uri.clone());
            let mut props = Properties::new();
            props.insert("file".into(), json!(file));
            props.insert("line".into(), json!(relation.site.line));
            props.insert("column".into(), json!(relation.site.column));
            PlannedEdge {
                group_key: file,
                from_key: relation.caller.to_string(),
                to_key: relation.callee.to_string(),
                props,
            }
        })
        .collect();

    planner::plan_edge_batches(
        EdgeType::Calls,
        NodeLabel::Function,
        NodeLabel::Function,
        edges,
        strategy,
        config,
    )
}
