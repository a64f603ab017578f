//! Spatial strategy: without container provenance, the caller is whichever
//! function body lexically contains the call site.
//!
//! Body spans come from the span provider and are attached to their
//! symbols first; extraction then resolves every legacy call reference
//! against a per-file span index.

use super::{CallExtractor, CallStats, Extraction};
use crate::models::{CallRelation, Location, SpanRange, SymbolGraph, SymbolId};
use crate::providers::FunctionSpan;
use rayon::prelude::*;
use rustc_hash::FxHashMap;
use tracing::{debug, info};

/// Below this many call sites the rayon fan-out costs more than it saves.
const PARALLEL_RESOLVE_THRESHOLD: usize = 100;

#[derive(Debug, Default, Clone, Copy)]
pub struct SpanMatchStats {
    pub matched: usize,
    /// Functions with a definition but no span reported for it.
    pub unmatched: usize,
}

/// Attach provider spans to function symbols, matching on the composite
/// key `(name, file URI, definition line, definition column)`. Each span is
/// written at most once; unmatched functions stay span-less and cannot be
/// resolved as callers.
pub fn attach_spans(graph: &mut SymbolGraph, spans: &[FunctionSpan]) -> SpanMatchStats {
    let mut lookup: FxHashMap<(&str, &str, u32, u32), &SpanRange> = FxHashMap::default();
    for span in spans {
        lookup.insert(
            (
                span.name.as_str(),
                span.file_uri.as_str(),
                span.name_location.start_line,
                span.name_location.start_column,
            ),
            &span.body_location,
        );
    }

    let mut stats = SpanMatchStats::default();
    for symbol in graph.symbols.values_mut() {
        if !symbol.is_function() {
            continue;
        }
        let Some(definition) = &symbol.definition else {
            continue;
        };
        let key = (
            symbol.name.as_str(),
            definition.file_uri.as_str(),
            definition.line,
            definition.column,
        );
        match lookup.get(&key) {
            Some(span) if symbol.body_location.is_none() => {
                symbol.body_location = Some(**span);
                stats.matched += 1;
            }
            Some(_) => stats.matched += 1,
            None => {
                debug!(
                    "no span match for function {} at {}:{}:{}",
                    symbol.name, definition.file_uri, definition.line, definition.column
                );
                stats.unmatched += 1;
            }
        }
    }
    info!(
        "matched {} of {} functions with body spans",
        stats.matched,
        stats.matched + stats.unmatched
    );
    stats
}

/// Per-file index of function body spans, sorted by start position.
pub struct SpatialExtractor {
    index: FxHashMap<String, Vec<(SpanRange, SymbolId)>>,
}

impl SpatialExtractor {
    /// Index every function that has both a definition and a body span.
    pub fn new(graph: &SymbolGraph) -> Self {
        let mut index: FxHashMap<String, Vec<(SpanRange, SymbolId)>> = FxHashMap::default();
        for symbol in graph.functions() {
            let (Some(definition), Some(span)) = (&symbol.definition, symbol.body_location) else {
                continue;
            };
            index
                .entry(definition.file_uri.clone())
                .or_default()
                .push((span, symbol.id));
        }
        for spans in index.values_mut() {
            spans.sort_by_key(|(span, _)| (span.start_line, span.start_column));
        }
        Self { index }
    }

    /// Find the function whose body contains the site: binary search on
    /// start position, then a backward scan for the containing span.
    fn resolve(&self, site: &Location) -> Option<SymbolId> {
        let spans = self.index.get(&site.file_uri)?;
        let upper = spans.partition_point(|(span, _)| {
            (span.start_line, span.start_column) <= (site.line, site.column)
        });
        spans[..upper]
            .iter()
            .rev()
            .find(|(span, _)| span.contains(site.line, site.column))
            .map(|&(_, id)| id)
    }
}

impl CallExtractor for SpatialExtractor {
    fn strategy_name(&self) -> &'static str {
        "spatial"
    }

    fn extract(&self, graph: &SymbolGraph) -> Extraction {
        let sites: Vec<(SymbolId, &Location)> = graph
            .functions()
            .flat_map(|symbol| {
                symbol
                    .references
                    .iter()
                    .filter(|r| r.kind.is_legacy_call())
                    .map(move |r| (symbol.id, &r.location))
            })
            .collect();

        let resolve_one = |&(callee, site): &(SymbolId, &Location)| -> Option<CallRelation> {
            self.resolve(site).map(|caller| CallRelation {
                caller,
                callee,
                site: site.clone(),
            })
        };

        let resolved: Vec<Option<CallRelation>> = if sites.len() < PARALLEL_RESOLVE_THRESHOLD {
            sites.iter().map(resolve_one).collect()
        } else {
            sites.par_iter().map(resolve_one).collect()
        };

        let total = resolved.len();
        let relations: Vec<CallRelation> = resolved.into_iter().flatten().collect();
        let stats = CallStats {
            outside_any_body: total - relations.len(),
            ..Default::default()
        };
        debug!(
            "spatial strategy: {} call relations, {} sites outside any body",
            relations.len(),
            stats.outside_any_body
        );
        Extraction { relations, stats }
    }
}
