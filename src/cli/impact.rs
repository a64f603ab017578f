//! The `impact` command: which sources rebuild when these headers change.

use crate::includes::impacted_sources;
use crate::paths::ProjectPaths;
use crate::providers::{FileProviders, SourceInfoProvider};
use anyhow::Result;
use console::style;
use std::path::{Path, PathBuf};

pub(super) fn run(project_root: &Path, includes_file: &Path, headers: &[PathBuf]) -> Result<()> {
    let paths = ProjectPaths::new(project_root);
    let provider = FileProviders {
        spans_file: None,
        includes_file: Some(includes_file.to_path_buf()),
    };
    let relations = provider.include_edges()?;

    let headers_abs: Vec<PathBuf> = headers
        .iter()
        .map(|h| {
            if h.is_absolute() {
                h.clone()
            } else {
                paths.root().join(h)
            }
        })
        .collect();

    let results = impacted_sources(&relations, &headers_abs);
    for header in &headers_abs {
        let sources = &results[header];
        println!(
            "{} {} impacts {} source file(s)",
            style("→").cyan(),
            header.display(),
            sources.len()
        );
        for source in sources {
            let shown = paths
                .abs_to_rel(source)
                .map(|rel| ProjectPaths::rel_str(&rel))
                .unwrap_or_else(|_| source.to_string_lossy().into_owned());
            println!("    {shown}");
        }
    }
    Ok(())
}
