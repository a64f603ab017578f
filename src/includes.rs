//! In-memory impact analysis over the include relation set.
//!
//! Given one or more changed headers, walks the reversed include graph and
//! reports every source file that transitively includes them. Works on the
//! raw absolute pairs from the provider, before any graph is built.

use rustc_hash::{FxHashMap, FxHashSet};
use std::collections::VecDeque;
use std::path::{Path, PathBuf};

const SOURCE_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx"];

fn is_source_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SOURCE_EXTENSIONS.contains(&e))
        .unwrap_or(false)
}

/// For each header, the sorted source files that transitively include it.
pub fn impacted_sources(
    relations: &[(PathBuf, PathBuf)],
    headers: &[PathBuf],
) -> FxHashMap<PathBuf, Vec<PathBuf>> {
    let mut reverse: FxHashMap<&Path, Vec<&Path>> = FxHashMap::default();
    for (including, included) in relations {
        reverse
            .entry(included.as_path())
            .or_default()
            .push(including.as_path());
    }

    let mut results = FxHashMap::default();
    for header in headers {
        let mut impacted: FxHashSet<&Path> = FxHashSet::default();
        let mut visited: FxHashSet<&Path> = FxHashSet::default();
        let mut queue: VecDeque<&Path> = VecDeque::new();

        visited.insert(header.as_path());
        queue.push_back(header.as_path());
        while let Some(current) = queue.pop_front() {
            for &dependent in reverse.get(current).into_iter().flatten() {
                if visited.insert(dependent) {
                    impacted.insert(dependent);
                    queue.push_back(dependent);
                }
            }
        }

        let mut sources: Vec<PathBuf> = impacted
            .into_iter()
            .filter(|p| is_source_file(p))
            .map(Path::to_path_buf)
            .collect();
        sources.sort();
        results.insert(header.clone(), sources);
    }
    results
}
