//! Orchestrator: sequences the passes over one index into one graph store.
//!
//! Phase 0 parses and links the index; phases 1–4 write the file
//! hierarchy, symbol nodes, defines edges, include edges, and the call
//! graph; phase 5 removes orphan nodes. The symbol graph is dropped before
//! the run returns. A cooperative cancellation flag is honoured between
//! passes; in-flight work runs to completion.

use crate::callgraph::{self, attach_spans, CallExtractor, ContainerExtractor, SpatialExtractor};
use crate::graph::builder;
use crate::graph::planner::{self, BatchingConfig, EdgeStrategy, PlannedEdge};
use crate::graph::schema;
use crate::graph::store::{GraphStore, MutationBatch, Properties, WriteSummary};
use crate::graph::{EdgeType, NodeLabel};
use crate::parser::SymbolParser;
use crate::paths::ProjectPaths;
use crate::providers::SourceInfoProvider;
use anyhow::{bail, Context, Result};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub workers: usize,
    pub defines_strategy: EdgeStrategy,
    pub calls_strategy: EdgeStrategy,
    pub batching: BatchingConfig,
    pub keep_orphans: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 1,
            defines_strategy: EdgeStrategy::ParallelCreate,
            calls_strategy: EdgeStrategy::ParallelCreate,
            batching: BatchingConfig::default(),
            keep_orphans: false,
        }
    }
}

/// Counters from one full build.
#[derive(Debug, Default, Clone)]
pub struct BuildStats {
    pub cache_hit: bool,
    pub documents: usize,
    pub symbols: usize,
    pub functions: usize,
    pub files: usize,
    pub folders: usize,
    pub defines_edges: usize,
    pub include_edges: usize,
    pub call_relations: usize,
    pub call_strategy: &'static str,
    pub dropped_unresolved_containers: usize,
    pub dropped_non_function_callers: usize,
    pub dropped_outside_any_body: usize,
    pub orphans_deleted: usize,
    pub edges_written: usize,
    pub nodes_written: usize,
}

impl BuildStats {
    pub fn summary(&self) -> String {
        format!(
            "{} symbols ({} functions), {} files, {} folders, {} defines edges, \
             {} include edges, {} call relations ({} strategy), {} orphans removed",
            self.symbols,
            self.functions,
            self.files,
            self.folders,
            self.defines_edges,
            self.include_edges,
            self.call_relations,
            self.call_strategy,
            self.orphans_deleted,
        )
    }
}

pub struct Pipeline<'a> {
    store: &'a dyn GraphStore,
    config: PipelineConfig,
    cancel: Arc<AtomicBool>,
}

impl<'a> Pipeline<'a> {
    pub fn new(store: &'a dyn GraphStore, config: PipelineConfig) -> Self {
        Self {
            store,
            config,
            cancel: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Share a cancellation flag; a set flag stops the run at the next
    /// pass boundary.
    pub fn with_cancel_flag(mut self, cancel: Arc<AtomicBool>) -> Self {
        self.cancel = cancel;
        self
    }

    fn check_cancelled(&self) -> Result<()> {
        if self.cancel.load(Ordering::Relaxed) {
            bail!("run cancelled between passes");
        }
        Ok(())
    }

    fn submit_all(&self, batches: &[MutationBatch], stats: &mut BuildStats) -> Result<()> {
        let total: u64 = batches.iter().map(|b| b.len() as u64).sum();
        // A bar is only worth drawing for bulk passes.
        let bar = (total >= 5_000).then(|| {
            indicatif::ProgressBar::new(total).with_style(
                indicatif::ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
                    .expect("static template")
                    .progress_chars("=> "),
            )
        });
        for batch in batches {
            if batch.is_empty() {
                continue;
            }
            let summary: WriteSummary = self
                .store
                .submit(batch)
                .context("mutation submission failed")?;
            stats.nodes_written += summary.nodes_written;
            stats.edges_written += summary.edges_written;
            if let Some(bar) = &bar {
                bar.inc(batch.len() as u64);
            }
        }
        if let Some(bar) = bar {
            bar.finish_and_clear();
        }
        Ok(())
    }

    /// Run the full build against one index file.
    pub fn run(
        &self,
        index_path: &Path,
        paths: &ProjectPaths,
        provider: &dyn SourceInfoProvider,
    ) -> Result<BuildStats> {
        let mut stats = BuildStats::default();

        info!("phase 0: parsing and linking {}", index_path.display());
        let parser = SymbolParser::new(index_path, self.config.workers);
        let (mut graph, parse_stats) = parser.parse()?;
        stats.cache_hit = parse_stats.cache_hit;
        stats.documents = parse_stats.documents;
        stats.symbols = graph.len();
        stats.functions = graph.function_count();
        self.check_cancelled()?;

        self.store.reset().context("failed to reset the graph")?;
        let commit = commit_hash(paths.root());
        if let Some(hash) = &commit {
            info!("stamping project node with commit {hash}");
        }
        self.store
            .submit(&builder::project_node(paths, commit.as_deref()))?;
        self.store.ensure_constraints(&schema::constraints())?;

        let include_pairs = provider
            .include_edges()
            .context("include provider failed")?;
        let includes = builder::normalize_includes(&include_pairs, paths);
        stats.include_edges = includes.len();

        info!("phase 1: file and folder hierarchy");
        let hierarchy = builder::collect_file_hierarchy(&graph, &includes, paths);
        stats.files = hierarchy.files.len();
        stats.folders = hierarchy.folders.len();
        self.submit_all(&builder::plan_file_hierarchy(&hierarchy, paths), &mut stats)?;
        self.check_cancelled()?;

        info!("phase 2: symbol nodes");
        self.submit_all(&builder::plan_symbol_nodes(&graph, paths), &mut stats)?;
        self.check_cancelled()?;

        info!(
            "phase 3: defines edges ({} strategy)",
            self.config.defines_strategy
        );
        let defines = builder::collect_defines_edges(&graph, paths);
        stats.defines_edges = defines.len();
        for target in [NodeLabel::Function, NodeLabel::DataStructure] {
            let planned: Vec<PlannedEdge> = defines
                .iter()
                .filter(|edge| edge.target == target)
                .map(|edge| PlannedEdge {
                    group_key: edge.file.clone(),
                    from_key: edge.file.clone(),
                    to_key: edge.id.to_string(),
                    props: Properties::new(),
                })
                .collect();
            let batches = planner::plan_edge_batches(
                EdgeType::Defines,
                NodeLabel::File,
                target,
                planned,
                self.config.defines_strategy,
                &self.config.batching,
            );
            self.submit_all(&batches, &mut stats)?;
        }
        self.check_cancelled()?;

        info!("phase 4: include edges");
        if let Some(batch) = builder::plan_include_edges(&includes) {
            self.submit_all(std::slice::from_ref(&batch), &mut stats)?;
        }
        self.check_cancelled()?;

        let extraction = if graph.has_container_field {
            let extractor = ContainerExtractor;
            info!(
                "phase 5: call graph ({} strategy, container field present)",
                extractor.strategy_name()
            );
            stats.call_strategy = extractor.strategy_name();
            extractor.extract(&graph)
        } else {
            let spans = provider
                .function_spans()
                .context("span provider failed")?;
            attach_spans(&mut graph, &spans);
            let extractor = SpatialExtractor::new(&graph);
            info!(
                "phase 5: call graph ({} strategy, no container field)",
                extractor.strategy_name()
            );
            stats.call_strategy = extractor.strategy_name();
            extractor.extract(&graph)
        };
        stats.dropped_unresolved_containers = extraction.stats.unresolved_containers;
        stats.dropped_non_function_callers = extraction.stats.non_function_callers;
        stats.dropped_outside_any_body = extraction.stats.outside_any_body;

        let mut relations = extraction.relations;
        callgraph::sort_relations(&mut relations);
        stats.call_relations = relations.len();
        let call_batches = callgraph::plan_call_batches(
            &relations,
            paths,
            self.config.calls_strategy,
            &self.config.batching,
        );
        drop(relations);
        self.submit_all(&call_batches, &mut stats)?;
        self.check_cancelled()?;

        if self.config.keep_orphans {
            info!("phase 6: keeping orphan nodes as requested");
        } else {
            info!("phase 6: orphan cleanup");
            let summary = self.store.submit(&MutationBatch::DeleteOrphans)?;
            stats.orphans_deleted = summary.nodes_deleted;
        }

        // The symbol graph is not needed past this point; release it before
        // returning to the caller.
        drop(graph);
        Ok(stats)
    }
}

/// HEAD commit of the repository containing the project root, if any.
fn commit_hash(root: &Path) -> Option<String> {
    let repo = match git2::Repository::discover(root) {
        Ok(repo) => repo,
        Err(e) => {
            warn!("no git repository at {} ({e}); project node carries no commit", root.display());
            return None;
        }
    };
    let head = repo.head().ok()?.peel_to_commit().ok()?;
    Some(head.id().to_string())
}
