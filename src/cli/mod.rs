//! CLI command definitions and handlers

mod build;
mod impact;

use crate::graph::planner::{EdgeStrategy, DEFAULT_CYPHER_TX_SIZE};
use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get().div_ceil(2))
        .unwrap_or(1)
}

/// clangraph - build a code knowledge graph from a clangd index
#[derive(Parser, Debug)]
#[command(name = "clangraph")]
#[command(version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Parse an index and build the full code graph
    Build {
        /// Path to the clangd index YAML file
        index_path: PathBuf,

        /// Root path of the project being indexed
        project_root: PathBuf,

        /// Number of parallel parse workers
        #[arg(long, default_value_t = default_workers())]
        workers: usize,

        /// Strategy for the DEFINES edge pass
        #[arg(long, default_value = "parallel-create")]
        defines_strategy: EdgeStrategy,

        /// Strategy for the CALLS edge pass
        #[arg(long, default_value = "parallel-create")]
        calls_strategy: EdgeStrategy,

        /// Target items per server-side transaction
        #[arg(long, default_value_t = DEFAULT_CYPHER_TX_SIZE)]
        cypher_tx_size: usize,

        /// Target items per client submission
        /// (default: cypher-tx-size x workers)
        #[arg(long)]
        ingest_batch_size: Option<usize>,

        /// Keep orphan nodes in the graph (skip cleanup)
        #[arg(long)]
        keep_orphans: bool,

        /// Pre-computed function spans YAML (for indexes without container
        /// provenance)
        #[arg(long)]
        spans_file: Option<PathBuf>,

        /// Absolute include pairs, one "including included" per line
        #[arg(long)]
        includes_file: Option<PathBuf>,

        /// Write a runnable Cypher script here instead of materialising the
        /// graph in memory
        #[arg(long)]
        emit_cypher: Option<PathBuf>,
    },

    /// Report source files transitively impacted by changed headers
    Impact {
        /// Root path of the project
        project_root: PathBuf,

        /// Absolute include pairs, one "including included" per line
        #[arg(long)]
        includes_file: PathBuf,

        /// Changed header (repeatable)
        #[arg(long = "header", required = true)]
        headers: Vec<PathBuf>,
    },
}

/// Run the CLI with parsed arguments
pub fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Build {
            index_path,
            project_root,
            workers,
            defines_strategy,
            calls_strategy,
            cypher_tx_size,
            ingest_batch_size,
            keep_orphans,
            spans_file,
            includes_file,
            emit_cypher,
        } => build::run(build::BuildArgs {
            index_path,
            project_root,
            workers,
            defines_strategy,
            calls_strategy,
            cypher_tx_size,
            ingest_batch_size,
            keep_orphans,
            spans_file,
            includes_file,
            emit_cypher,
        }),

        Commands::Impact {
            project_root,
            includes_file,
            headers,
        } => impact::run(&project_root, &includes_file, &headers),
    }
}
