//! Container strategy: the index already names the function whose body
//! holds each call site, so resolution is a map lookup per reference.

use super::{CallExtractor, CallStats, Extraction};
use crate::models::{CallRelation, SymbolGraph};
use tracing::{debug, warn};

pub struct ContainerExtractor;

impl CallExtractor for ContainerExtractor {
    fn strategy_name(&self) -> &'static str {
        "container"
    }

    fn extract(&self, graph: &SymbolGraph) -> Extraction {
        let mut relations = Vec::new();
        let mut stats = CallStats::default();

        for callee in graph.symbols.values() {
            if !callee.is_function() {
                continue;
            }
            for reference in &callee.references {
                if !reference.kind.is_container_call() {
                    continue;
                }
                let Some(container_id) = reference.container else {
                    continue;
                };
                match graph.get(container_id) {
                    None => {
                        // The container points outside the indexed set.
                        stats.unresolved_containers += 1;
                    }
                    Some(caller) if !caller.is_function() => {
                        warn!(
                            "reference container {} ({}) is a {:?}, not a function; dropping call to {}",
                            container_id, caller.name, caller.kind, callee.name
                        );
                        stats.non_function_callers += 1;
                    }
                    Some(caller) => {
                        relations.push(CallRelation {
                            caller: caller.id,
                            callee: callee.id,
                            site: reference.location.clone(),
                        });
                    }
                }
            }
        }

        debug!(
            "container strategy: {} call relations, {} unresolved containers",
            relations.len(),
            stats.unresolved_containers
        );
        Extraction { relations, stats }
    }
}
