//! clangraph - graph-powered C/C++ code index ingestion
//!
//! Parses a clangd index stream and materialises the code knowledge graph:
//! files, folders, functions, data structures, and the call graph.

use anyhow::Result;
use clap::Parser;
use clangraph::cli;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    // Parse CLI args and run
    let cli = cli::Cli::parse();
    cli::run(cli)
}
