//! Streaming index parser: cache lookup, chunking, parallel parsing, and
//! the single-threaded link phase.
//!
//! The YAML tokenisation dominates runtime, so it fans out across worker
//! threads over owned document chunks; the link phase (one map insertion
//! per reference) stays on the main thread.

pub mod cache;
pub mod chunk;
pub mod document;

use crate::models::{Reference, Symbol, SymbolGraph, SymbolId};
use chunk::Chunk;
use crossbeam_channel::bounded;
use document::ParsedDoc;
use indicatif::{ProgressBar, ProgressStyle};
use rustc_hash::FxHashMap;
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use std::thread;
use thiserror::Error;
use tracing::{debug, info};

/// Chunk-count multiplier per worker, for load balance.
const CHUNKS_PER_WORKER: usize = 3;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("failed to read index file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("malformed YAML in documents {first_doc}..{last_doc}: {message}")]
    YamlSyntax {
        first_doc: usize,
        last_doc: usize,
        message: String,
    },

    #[error("duplicate symbol id {0} in the index")]
    DuplicateSymbolId(SymbolId),

    #[error("index parser worker crashed")]
    WorkerCrashed,
}

#[derive(Debug, Default, Clone)]
pub struct ParseStats {
    pub documents: usize,
    pub symbols: usize,
    pub references: usize,
    pub cache_hit: bool,
}

/// Output of one worker: symbols without references, plus the reference
/// lists still waiting to be linked.
struct WorkerOutput {
    symbols: FxHashMap<SymbolId, Symbol>,
    refs: Vec<(SymbolId, Vec<Reference>)>,
    documents: usize,
}

pub struct SymbolParser {
    index_path: PathBuf,
    workers: usize,
}

impl SymbolParser {
    pub fn new(index_path: &Path, workers: usize) -> Self {
        Self {
            index_path: index_path.to_path_buf(),
            workers: workers.max(1),
        }
    }

    /// Parse the index into a fully linked symbol graph.
    pub fn parse(&self) -> Result<(SymbolGraph, ParseStats), ParseError> {
        if let Some(graph) = cache::load(&self.index_path) {
            info!(
                "cache hit: {} symbols loaded without parsing YAML",
                graph.len()
            );
            let stats = ParseStats {
                documents: 0,
                symbols: graph.len(),
                references: graph.reference_count(),
                cache_hit: true,
            };
            return Ok((graph, stats));
        }

        let content = std::fs::read_to_string(&self.index_path).map_err(|source| {
            ParseError::Io {
                path: self.index_path.clone(),
                source,
            }
        })?;
        // The upstream producer emits tabs, which strict YAML rejects.
        let content = content.replace('\t', " ");

        let chunks = chunk::split_documents(&content, self.workers * CHUNKS_PER_WORKER);
        drop(content);
        debug!(
            "split index into {} chunks for {} workers",
            chunks.len(),
            self.workers
        );

        let outputs = if self.workers == 1 || chunks.len() <= 1 {
            chunks
                .iter()
                .map(parse_chunk)
                .collect::<Result<Vec<_>, _>>()?
        } else {
            parallel_parse(chunks, self.workers)?
        };

        let (graph, mut stats) = link(outputs)?;
        stats.cache_hit = false;
        info!(
            "parsed {} documents: {} symbols, {} references linked",
            stats.documents, stats.symbols, stats.references
        );

        cache::store(&self.index_path, &graph);
        Ok((graph, stats))
    }
}

/// Parse one chunk into symbols and unlinked references. Pure function of
/// the chunk bytes.
fn parse_chunk(chunk: &Chunk) -> Result<WorkerOutput, ParseError> {
    let mut symbols = FxHashMap::default();
    let mut refs = Vec::new();
    let mut documents = 0;

    for de in serde_yaml::Deserializer::from_str(&chunk.text) {
        let value = Value::deserialize(de).map_err(|e| ParseError::YamlSyntax {
            first_doc: chunk.first_doc,
            last_doc: chunk.first_doc + chunk.doc_count.saturating_sub(1),
            message: e.to_string(),
        })?;
        documents += 1;

        match document::classify(&value) {
            ParsedDoc::Symbol(symbol) => {
                let id = symbol.id;
                if symbols.insert(id, symbol).is_some() {
                    return Err(ParseError::DuplicateSymbolId(id));
                }
            }
            ParsedDoc::Refs { target, refs: r } => refs.push((target, r)),
            ParsedDoc::Skipped => {}
        }
    }

    Ok(WorkerOutput {
        symbols,
        refs,
        documents,
    })
}

/// Fan chunks out to worker threads over bounded channels and collect their
/// outputs. Workers share nothing; each returns owned collections.
fn parallel_parse(chunks: Vec<Chunk>, workers: usize) -> Result<Vec<WorkerOutput>, ParseError> {
    let total = chunks.len();
    let (chunk_tx, chunk_rx) = bounded::<Chunk>(workers);
    let (result_tx, result_rx) = bounded::<Result<WorkerOutput, ParseError>>(workers);

    let bar = ProgressBar::new(total as u64).with_style(
        ProgressStyle::with_template("{msg} [{bar:30}] {pos}/{len}")
            .expect("static template")
            .progress_chars("=> "),
    );
    bar.set_message("Parsing index chunks");

    let mut outputs = Vec::with_capacity(total);
    let mut first_err = None;
    let mut crashed = false;

    thread::scope(|s| {
        let producer = s.spawn(move || {
            for c in chunks {
                if chunk_tx.send(c).is_err() {
                    break;
                }
            }
        });

        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            let rx = chunk_rx.clone();
            let tx = result_tx.clone();
            handles.push(s.spawn(move || {
                for c in rx {
                    let result = parse_chunk(&c);
                    let failed = result.is_err();
                    if tx.send(result).is_err() || failed {
                        break;
                    }
                }
            }));
        }
        drop(chunk_rx);
        drop(result_tx);

        while outputs.len() < total {
            match result_rx.recv() {
                Ok(Ok(output)) => {
                    outputs.push(output);
                    bar.inc(1);
                }
                Ok(Err(e)) => {
                    first_err = Some(e);
                    break;
                }
                // All senders gone: a worker died without reporting.
                Err(_) => break,
            }
        }
        drop(result_rx);

        for handle in handles {
            if handle.join().is_err() {
                crashed = true;
            }
        }
        let _ = producer.join();
    });
    bar.finish_and_clear();

    if let Some(e) = first_err {
        return Err(e);
    }
    if crashed || outputs.len() != total {
        return Err(ParseError::WorkerCrashed);
    }
    Ok(outputs)
}

/// Merge worker outputs and run the single-threaded link phase.
fn link(outputs: Vec<WorkerOutput>) -> Result<(SymbolGraph, ParseStats), ParseError> {
    let mut merged: FxHashMap<SymbolId, Symbol> = FxHashMap::default();
    let mut pending: Vec<(SymbolId, Vec<Reference>)> = Vec::new();
    let mut documents = 0;

    for output in outputs {
        documents += output.documents;
        merged.reserve(output.symbols.len());
        for (id, symbol) in output.symbols {
            if merged.insert(id, symbol).is_some() {
                return Err(ParseError::DuplicateSymbolId(id));
            }
        }
        pending.extend(output.refs);
    }

    let mut has_container_field = false;
    let mut linked = 0usize;
    for (target, refs) in pending.drain(..) {
        if !has_container_field {
            has_container_field = refs.iter().any(|r| r.container.is_some());
        }
        // A refs document may precede its symbol in the stream, or the
        // symbol may be absent entirely; the latter is dropped here.
        if let Some(symbol) = merged.get_mut(&target) {
            linked += refs.len();
            symbol.references.extend(refs);
        }
    }

    let stats = ParseStats {
        documents,
        symbols: merged.len(),
        references: linked,
        cache_hit: false,
    };
    let graph = SymbolGraph {
        symbols: merged,
        has_container_field,
    };
    Ok((graph, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const TWO_SYMBOLS: &str = r#"---
!Symbol
ID: 'AAAAAAAAAAAAAAAA'
Name: alpha
SymInfo:
  Kind: Function
  Lang: C
Definition:
  FileURI: 'file:///p/src/x.c'
  Start: { Line: 10, Column: 5 }
  End: { Line: 10, Column: 10 }
---
!Refs
ID: 'BBBBBBBBBBBBBBBB'
References:
  - Kind: 20
    Location:
      FileURI: 'file:///p/src/x.c'
      Start: { Line: 12, Column: 9 }
      End: { Line: 12, Column: 13 }
    Container:
      ID: 'AAAAAAAAAAAAAAAA'
---
!Symbol
ID: 'BBBBBBBBBBBBBBBB'
Name: beta
SymInfo:
  Kind: Function
  Lang: C
Definition:
  FileURI: 'file:///p/src/x.c'
  Start: { Line: 20, Column: 5 }
  End: { Line: 20, Column: 9 }
"#;

    fn write_index(content: &str) -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        f.write_all(content.as_bytes()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_refs_link_across_document_order() {
        let (_dir, path) = write_index(TWO_SYMBOLS);
        let (graph, stats) = SymbolParser::new(&path, 1).parse().unwrap();

        assert_eq!(graph.len(), 2);
        assert_eq!(stats.references, 1);
        assert!(graph.has_container_field);

        let beta = graph.get("BBBBBBBBBBBBBBBB".parse().unwrap()).unwrap();
        assert_eq!(beta.references.len(), 1);
        assert_eq!(
            beta.references[0].container,
            Some("AAAAAAAAAAAAAAAA".parse().unwrap())
        );
        let alpha = graph.get("AAAAAAAAAAAAAAAA".parse().unwrap()).unwrap();
        assert!(alpha.references.is_empty());
    }

    #[test]
    fn test_empty_index_is_an_empty_graph() {
        let (_dir, path) = write_index("");
        let (graph, stats) = SymbolParser::new(&path, 4).parse().unwrap();
        assert!(graph.is_empty());
        assert!(!graph.has_container_field);
        assert_eq!(stats.documents, 0);
    }

    #[test]
    fn test_refs_without_symbol_are_tolerated() {
        let content = r#"---
!Refs
ID: 'CCCCCCCCCCCCCCCC'
References:
  - Kind: 4
    Location:
      FileURI: 'file:///p/src/x.c'
      Start: { Line: 1, Column: 1 }
      End: { Line: 1, Column: 2 }
"#;
        let (_dir, path) = write_index(content);
        let (graph, _) = SymbolParser::new(&path, 1).parse().unwrap();
        assert!(graph.is_empty());
        // Container flag reflects the scanned references, present or not.
        assert!(!graph.has_container_field);
    }

    #[test]
    fn test_worker_count_does_not_change_the_graph() {
        let mut content = String::new();
        for i in 1..=40u64 {
            content.push_str(&format!(
                "---\n!Symbol\nID: '{:016X}'\nName: f{}\nSymInfo:\n  Kind: Function\n  Lang: C\n",
                i, i
            ));
        }
        for i in 1..=40u64 {
            content.push_str(&format!(
                "---\n!Refs\nID: '{:016X}'\nReferences:\n  - Kind: 12\n    Location:\n      FileURI: 'file:///p/a.c'\n      Start: {{ Line: {}, Column: 1 }}\n      End: {{ Line: {}, Column: 2 }}\n",
                i, i, i
            ));
        }

        let (_dir1, path1) = write_index(&content);
        let (_dir2, path2) = write_index(&content);
        let (serial, _) = SymbolParser::new(&path1, 1).parse().unwrap();
        let (parallel, _) = SymbolParser::new(&path2, 4).parse().unwrap();
        assert_eq!(serial, parallel);
    }

    #[test]
    fn test_duplicate_symbol_id_is_fatal() {
        let content = r#"---
!Symbol
ID: 'AAAAAAAAAAAAAAAA'
Name: one
SymInfo:
  Kind: Function
---
!Symbol
ID: 'AAAAAAAAAAAAAAAA'
Name: two
SymInfo:
  Kind: Function
"#;
        let (_dir, path) = write_index(content);
        let err = SymbolParser::new(&path, 1).parse().unwrap_err();
        assert!(matches!(err, ParseError::DuplicateSymbolId(_)));
    }

    #[test]
    fn test_malformed_yaml_reports_document_range() {
        let content = "---\n!Symbol\nID: 'AAAAAAAAAAAAAAAA'\nName: [unclosed\n";
        let (_dir, path) = write_index(content);
        let err = SymbolParser::new(&path, 1).parse().unwrap_err();
        assert!(matches!(err, ParseError::YamlSyntax { .. }));
    }

    #[test]
    fn test_inline_tagged_documents_parse() {
        let content = "--- !Symbol\nID: 'AAAAAAAAAAAAAAAA'\nName: alpha\nSymInfo:\n  Kind: Function\n  Lang: C\n--- !Refs\nID: 'AAAAAAAAAAAAAAAA'\nReferences:\n  - Kind: 4\n    Location:\n      FileURI: 'file:///p/a.c'\n      Start: { Line: 3, Column: 1 }\n      End: { Line: 3, Column: 6 }\n";
        let (_dir, path) = write_index(content);
        let (graph, stats) = SymbolParser::new(&path, 1).parse().unwrap();
        assert_eq!(graph.len(), 1);
        assert_eq!(stats.references, 1);
        let alpha = graph.get("AAAAAAAAAAAAAAAA".parse().unwrap()).unwrap();
        assert_eq!(alpha.references.len(), 1);
    }

    #[test]
    fn test_tabs_are_tolerated() {
        let content = "---\n!Symbol\nID: 'AAAAAAAAAAAAAAAA'\nName:\ttabbed\nSymInfo:\n  Kind: Function\n";
        let (_dir, path) = write_index(content);
        let (graph, _) = SymbolParser::new(&path, 1).parse().unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_second_parse_hits_the_cache() {
        let (_dir, path) = write_index(TWO_SYMBOLS);
        let (first, stats1) = SymbolParser::new(&path, 1).parse().unwrap();
        assert!(!stats1.cache_hit);
        let (second, stats2) = SymbolParser::new(&path, 1).parse().unwrap();
        assert!(stats2.cache_hit);
        assert_eq!(first, second);
    }
}
