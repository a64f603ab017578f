//! clangraph - code knowledge graph builder for C/C++ indexes
//!
//! Ingests a clangd-style YAML symbol index plus span/include information
//! from the source tree and materialises a file/symbol/call graph through a
//! narrow graph-store interface.

pub mod callgraph;
pub mod cli;
pub mod graph;
pub mod includes;
pub mod models;
pub mod parser;
pub mod paths;
pub mod pipeline;
pub mod providers;
