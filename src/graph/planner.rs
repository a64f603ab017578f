//! Ingestion planner: turns high-volume edge sets into mutation batches
//! under the write-lock and transaction-size constraints.
//!
//! Parallel edge creation deadlocks when server workers contend on a
//! shared endpoint, so the parallel strategies group edges client-side by
//! that endpoint; a group is never split, which keeps any one endpoint on
//! a single server worker. Batch sizing is two-level: the client batch
//! bounds one submission, the server batch bounds one transaction.

use super::schema::{EdgeType, NodeLabel};
use super::store::{
    EdgeBatch, EdgeGroup, EdgeRow, MutationBatch, Properties, WriteSemantics,
};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_CYPHER_TX_SIZE: usize = 2000;

/// Strategy for one high-volume edge pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EdgeStrategy {
    /// Single UNWIND mutation per client batch, CREATE semantics,
    /// single-threaded on the server. Idempotent only on an empty graph.
    UnwindCreate,
    /// Endpoint-grouped server-side iteration with MERGE semantics.
    /// Deadlock-safe and idempotent.
    ParallelMerge,
    /// Endpoint-grouped iteration with CREATE semantics. Deadlock-safe and
    /// the fastest; not idempotent.
    ParallelCreate,
}

impl EdgeStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeStrategy::UnwindCreate => "unwind-create",
            EdgeStrategy::ParallelMerge => "parallel-merge",
            EdgeStrategy::ParallelCreate => "parallel-create",
        }
    }

    pub fn semantics(self) -> WriteSemantics {
        match self {
            EdgeStrategy::ParallelMerge => WriteSemantics::Merge,
            _ => WriteSemantics::Create,
        }
    }

    pub fn is_grouped(self) -> bool {
        !matches!(self, EdgeStrategy::UnwindCreate)
    }
}

impl FromStr for EdgeStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "unwind-create" => Ok(EdgeStrategy::UnwindCreate),
            "parallel-merge" => Ok(EdgeStrategy::ParallelMerge),
            "parallel-create" => Ok(EdgeStrategy::ParallelCreate),
            other => Err(format!("unknown edge strategy: {other}")),
        }
    }
}

impl fmt::Display for EdgeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Two-level batch sizing.
#[derive(Debug, Clone, Copy)]
pub struct BatchingConfig {
    /// Target items per server-side transaction.
    pub cypher_tx_size: usize,
    /// Target items per client submission.
    pub ingest_batch_size: usize,
}

impl BatchingConfig {
    pub fn new(cypher_tx_size: usize, ingest_batch_size: Option<usize>, workers: usize) -> Self {
        let cypher_tx_size = cypher_tx_size.max(1);
        Self {
            cypher_tx_size,
            ingest_batch_size: ingest_batch_size
                .unwrap_or(cypher_tx_size * workers.max(1))
                .max(1),
        }
    }
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self::new(DEFAULT_CYPHER_TX_SIZE, None, 1)
    }
}

/// One edge with its lock-partitioning key, before planning.
#[derive(Debug, Clone)]
pub struct PlannedEdge {
    /// The shared endpoint the parallel strategies group by.
    pub group_key: String,
    pub from_key: String,
    pub to_key: String,
    pub props: Properties,
}

impl PlannedEdge {
    fn into_row(self) -> EdgeRow {
        EdgeRow {
            from_key: self.from_key,
            to_key: self.to_key,
            props: self.props,
        }
    }
}

/// Plan a high-volume edge pass under the configured strategy.
pub fn plan_edge_batches(
    edge_type: EdgeType,
    from: NodeLabel,
    to: NodeLabel,
    edges: Vec<PlannedEdge>,
    strategy: EdgeStrategy,
    config: &BatchingConfig,
) -> Vec<MutationBatch> {
    if edges.is_empty() {
        return Vec::new();
    }
    match strategy {
        EdgeStrategy::UnwindCreate => {
            plan_unwind(edge_type, from, to, edges, config.ingest_batch_size)
        }
        EdgeStrategy::ParallelMerge | EdgeStrategy::ParallelCreate => plan_grouped(
            edge_type,
            from,
            to,
            edges,
            strategy.semantics(),
            config,
        ),
    }
}

fn plan_unwind(
    edge_type: EdgeType,
    from: NodeLabel,
    to: NodeLabel,
    edges: Vec<PlannedEdge>,
    client_batch: usize,
) -> Vec<MutationBatch> {
    let mut batches = Vec::new();
    let mut rows = Vec::with_capacity(client_batch.min(edges.len()));
    for edge in edges {
        rows.push(edge.into_row());
        if rows.len() >= client_batch {
            batches.push(MutationBatch::Edges(EdgeBatch {
                edge_type,
                from,
                to,
                semantics: WriteSemantics::Create,
                rows: std::mem::take(&mut rows),
            }));
        }
    }
    if !rows.is_empty() {
        batches.push(MutationBatch::Edges(EdgeBatch {
            edge_type,
            from,
            to,
            semantics: WriteSemantics::Create,
            rows,
        }));
    }
    batches
}

fn plan_grouped(
    edge_type: EdgeType,
    from: NodeLabel,
    to: NodeLabel,
    edges: Vec<PlannedEdge>,
    semantics: WriteSemantics,
    config: &BatchingConfig,
) -> Vec<MutationBatch> {
    let total = edges.len();
    let mut grouped: BTreeMap<String, Vec<EdgeRow>> = BTreeMap::new();
    for edge in edges {
        grouped
            .entry(edge.group_key.clone())
            .or_default()
            .push(edge.into_row());
    }

    // Server transactions commit every B_s groups, sized so one transaction
    // holds about cypher_tx_size edges.
    let avg_edges_per_group = total.div_ceil(grouped.len());
    let server_batch_size = (config.cypher_tx_size / avg_edges_per_group).max(1);

    let mut batches = Vec::new();
    let mut groups: Vec<EdgeGroup> = Vec::new();
    let mut pending_edges = 0usize;
    for (key, rows) in grouped {
        pending_edges += rows.len();
        groups.push(EdgeGroup { key, rows });
        if pending_edges >= config.ingest_batch_size {
            batches.push(grouped_batch(
                edge_type,
                from,
                to,
                semantics,
                server_batch_size,
                std::mem::take(&mut groups),
            ));
            pending_edges = 0;
        }
    }
    if !groups.is_empty() {
        batches.push(grouped_batch(
            edge_type,
            from,
            to,
            semantics,
            server_batch_size,
            groups,
        ));
    }
    batches
}

fn grouped_batch(
    edge_type: EdgeType,
    from: NodeLabel,
    to: NodeLabel,
    semantics: WriteSemantics,
    server_batch_size: usize,
    groups: Vec<EdgeGroup>,
) -> MutationBatch {
    MutationBatch::GroupedEdges(super::store::GroupedEdgeBatch {
        edge_type,
        from,
        to,
        semantics,
        server_batch_size,
        groups,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edges(spec: &[(&str, &str, &str)]) -> Vec<PlannedEdge> {
        spec.iter()
            .map(|(group, from, to)| PlannedEdge {
                group_key: group.to_string(),
                from_key: from.to_string(),
                to_key: to.to_string(),
                props: Properties::new(),
            })
            .collect()
    }

    #[test]
    fn test_strategy_round_trip() {
        for s in [
            EdgeStrategy::UnwindCreate,
            EdgeStrategy::ParallelMerge,
            EdgeStrategy::ParallelCreate,
        ] {
            assert_eq!(s.as_str().parse::<EdgeStrategy>().unwrap(), s);
        }
        assert!("batched-parallel".parse::<EdgeStrategy>().is_err());
    }

    #[test]
    fn test_default_ingest_batch_is_tx_size_times_workers() {
        let config = BatchingConfig::new(2000, None, 4);
        assert_eq!(config.ingest_batch_size, 8000);
        let explicit = BatchingConfig::new(2000, Some(500), 4);
        assert_eq!(explicit.ingest_batch_size, 500);
    }

    #[test]
    fn test_unwind_create_chunks_by_client_batch() {
        let input = edges(&[
            ("f1", "f1", "01"),
            ("f1", "f1", "02"),
            ("f2", "f2", "03"),
            ("f2", "f2", "04"),
            ("f3", "f3", "05"),
        ]);
        let config = BatchingConfig::new(2000, Some(2), 1);
        let batches = plan_edge_batches(
            EdgeType::Defines,
            NodeLabel::File,
            NodeLabel::Function,
            input,
            EdgeStrategy::UnwindCreate,
            &config,
        );
        assert_eq!(batches.len(), 3);
        let sizes: Vec<usize> = batches.iter().map(|b| b.len()).collect();
        assert_eq!(sizes, vec![2, 2, 1]);
        for batch in &batches {
            let MutationBatch::Edges(e) = batch else {
                panic!("expected flat edge batch");
            };
            assert_eq!(e.semantics, WriteSemantics::Create);
        }
    }

    #[test]
    fn test_groups_are_never_split_across_batches() {
        // Three groups of three edges, client batch too small to hold one
        // group twice over.
        let mut input = Vec::new();
        for file in ["a.c", "b.c", "c.c"] {
            for i in 0..3 {
                input.push(PlannedEdge {
                    group_key: file.to_string(),
                    from_key: file.to_string(),
                    to_key: format!("{file}-{i}"),
                    props: Properties::new(),
                });
            }
        }
        let config = BatchingConfig::new(2000, Some(4), 1);
        let batches = plan_edge_batches(
            EdgeType::Defines,
            NodeLabel::File,
            NodeLabel::Function,
            input,
            EdgeStrategy::ParallelCreate,
            &config,
        );

        let mut seen_groups = std::collections::HashMap::new();
        for (batch_idx, batch) in batches.iter().enumerate() {
            let MutationBatch::GroupedEdges(grouped) = batch else {
                panic!("expected grouped batch");
            };
            for group in &grouped.groups {
                assert_eq!(group.rows.len(), 3, "group must stay whole");
                assert!(
                    seen_groups.insert(group.key.clone(), batch_idx).is_none(),
                    "group {} appears in more than one batch",
                    group.key
                );
            }
        }
        assert_eq!(seen_groups.len(), 3);
    }

    #[test]
    fn test_server_batch_size_follows_group_density() {
        // 10 groups x 2 edges: avg 2 edges/group, tx 2000 -> 1000 groups
        // per server transaction.
        let mut input = Vec::new();
        for g in 0..10 {
            for i in 0..2 {
                input.push(PlannedEdge {
                    group_key: format!("g{g}"),
                    from_key: format!("g{g}"),
                    to_key: format!("{g}-{i}"),
                    props: Properties::new(),
                });
            }
        }
        let config = BatchingConfig::new(2000, None, 1);
        let batches = plan_edge_batches(
            EdgeType::Defines,
            NodeLabel::File,
            NodeLabel::Function,
            input,
            EdgeStrategy::ParallelMerge,
            &config,
        );
        assert_eq!(batches.len(), 1);
        let MutationBatch::GroupedEdges(grouped) = &batches[0] else {
            panic!("expected grouped batch");
        };
        assert_eq!(grouped.server_batch_size, 1000);
        assert_eq!(grouped.semantics, WriteSemantics::Merge);
    }

    #[test]
    fn test_empty_input_plans_nothing() {
        let config = BatchingConfig::default();
        assert!(plan_edge_batches(
            EdgeType::Calls,
            NodeLabel::Function,
            NodeLabel::Function,
            Vec::new(),
            EdgeStrategy::ParallelCreate,
            &config,
        )
        .is_empty());
    }
}
