//! The `build` command: full index → graph run.

use crate::graph::cypher::CypherScriptWriter;
use crate::graph::planner::{BatchingConfig, EdgeStrategy};
use crate::graph::MemoryGraph;
use crate::paths::ProjectPaths;
use crate::pipeline::{BuildStats, Pipeline, PipelineConfig};
use crate::providers::FileProviders;
use anyhow::Result;
use console::style;
use std::path::PathBuf;

pub(super) struct BuildArgs {
    pub index_path: PathBuf,
    pub project_root: PathBuf,
    pub workers: usize,
    pub defines_strategy: EdgeStrategy,
    pub calls_strategy: EdgeStrategy,
    pub cypher_tx_size: usize,
    pub ingest_batch_size: Option<usize>,
    pub keep_orphans: bool,
    pub spans_file: Option<PathBuf>,
    pub includes_file: Option<PathBuf>,
    pub emit_cypher: Option<PathBuf>,
}

pub(super) fn run(args: BuildArgs) -> Result<()> {
    let paths = ProjectPaths::new(&args.project_root);
    let provider = FileProviders {
        spans_file: args.spans_file,
        includes_file: args.includes_file,
    };
    let config = PipelineConfig {
        workers: args.workers.max(1),
        defines_strategy: args.defines_strategy,
        calls_strategy: args.calls_strategy,
        batching: BatchingConfig::new(args.cypher_tx_size, args.ingest_batch_size, args.workers),
        keep_orphans: args.keep_orphans,
    };

    match args.emit_cypher {
        Some(script_path) => {
            let store = CypherScriptWriter::create(&script_path)?;
            let stats = Pipeline::new(&store, config).run(&args.index_path, &paths, &provider)?;
            print_summary(&stats);
            println!(
                "{} cypher script written to {}",
                style("✓").green(),
                script_path.display()
            );
        }
        None => {
            let store = MemoryGraph::new();
            let stats = Pipeline::new(&store, config).run(&args.index_path, &paths, &provider)?;
            print_summary(&stats);
            let mut counts: Vec<(String, i64)> = store.stats().into_iter().collect();
            counts.sort();
            for (label, count) in counts {
                println!("  {:<16} {}", label, count);
            }
        }
    }
    Ok(())
}

fn print_summary(stats: &BuildStats) {
    if stats.cache_hit {
        println!("{} parse cache hit", style("✓").green());
    }
    println!("{} {}", style("✓").green(), stats.summary());
    let dropped = stats.dropped_unresolved_containers
        + stats.dropped_non_function_callers
        + stats.dropped_outside_any_body;
    if dropped > 0 {
        println!(
            "  dropped call sites: {} unresolved container, {} non-function caller, {} outside any body",
            stats.dropped_unresolved_containers,
            stats.dropped_non_function_callers,
            stats.dropped_outside_any_body,
        );
    }
}
