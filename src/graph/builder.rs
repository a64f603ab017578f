//! Pure transformations from the symbol graph into mutation batches: the
//! file hierarchy, symbol nodes, defines-edge collection, and include
//! edges. No I/O happens here; the passes only produce batches.

use super::schema::{EdgeType, NodeLabel};
use super::store::{EdgeBatch, EdgeRow, MutationBatch, NodeBatch, NodeRow, Properties, WriteSemantics};
use crate::models::{IncludeEdge, SymbolGraph, SymbolId, SymbolKind};
use crate::paths::ProjectPaths;
use serde_json::json;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Every project-relative file and folder that must exist in the graph.
/// Folders are depth-ordered so parents are written before children.
#[derive(Debug, Default)]
pub struct FileHierarchy {
    pub files: Vec<PathBuf>,
    pub folders: Vec<PathBuf>,
}

/// Union of symbol locations and include endpoints, so headers that define
/// no symbol but are included by a source file still get a file node.
pub fn collect_file_hierarchy(
    graph: &SymbolGraph,
    includes: &[IncludeEdge],
    paths: &ProjectPaths,
) -> FileHierarchy {
    let mut files: BTreeSet<PathBuf> = BTreeSet::new();
    let mut external = 0usize;

    for symbol in graph.symbols.values() {
        for location in [symbol.definition.as_ref(), symbol.declaration.as_ref()]
            .into_iter()
            .flatten()
        {
            match paths.uri_to_rel(&location.file_uri) {
                Ok(rel) => {
                    files.insert(rel);
                }
                Err(_) => external += 1,
            }
        }
    }
    for edge in includes {
        files.insert(edge.including.clone());
        files.insert(edge.included.clone());
    }
    if external > 0 {
        debug!("filtered {external} symbol locations outside the project root");
    }

    let mut folders: BTreeSet<PathBuf> = BTreeSet::new();
    for file in &files {
        for ancestor in ProjectPaths::ancestor_folders(file) {
            folders.insert(ancestor);
        }
    }
    let mut folders: Vec<PathBuf> = folders.into_iter().collect();
    folders.sort_by_key(|p| (p.components().count(), p.clone()));

    FileHierarchy {
        files: files.into_iter().collect(),
        folders,
    }
}

/// The project root node, labelled `PROJECT:FOLDER` and keyed by the
/// absolute root path.
pub fn project_node(paths: &ProjectPaths, commit_hash: Option<&str>) -> MutationBatch {
    let mut props = Properties::new();
    props.insert("name".into(), json!(paths.project_name()));
    if let Some(hash) = commit_hash {
        props.insert("commit_hash".into(), json!(hash));
    }
    MutationBatch::Nodes(NodeBatch {
        label: NodeLabel::Project,
        extra_label: Some(NodeLabel::Folder),
        rows: vec![NodeRow {
            key: paths.root_str(),
            props,
        }],
    })
}

fn name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default()
}

/// The parent key of a relative path: the containing folder, or the project
/// root for top-level entries (the project node carries the FOLDER label).
fn parent_key(rel: &Path, paths: &ProjectPaths) -> String {
    match rel.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => ProjectPaths::rel_str(parent),
        _ => paths.root_str(),
    }
}

/// Pass P1: folder and file nodes plus the containment edges.
pub fn plan_file_hierarchy(hierarchy: &FileHierarchy, paths: &ProjectPaths) -> Vec<MutationBatch> {
    let folder_rows: Vec<NodeRow> = hierarchy
        .folders
        .iter()
        .map(|folder| {
            let mut props = Properties::new();
            props.insert("name".into(), json!(name_of(folder)));
            NodeRow {
                key: ProjectPaths::rel_str(folder),
                props,
            }
        })
        .collect();

    let file_rows: Vec<NodeRow> = hierarchy
        .files
        .iter()
        .map(|file| {
            let mut props = Properties::new();
            props.insert("name".into(), json!(name_of(file)));
            NodeRow {
                key: ProjectPaths::rel_str(file),
                props,
            }
        })
        .collect();

    let folder_contains: Vec<EdgeRow> = hierarchy
        .folders
        .iter()
        .map(|folder| EdgeRow {
            from_key: parent_key(folder, paths),
            to_key: ProjectPaths::rel_str(folder),
            props: Properties::new(),
        })
        .collect();

    let file_contains: Vec<EdgeRow> = hierarchy
        .files
        .iter()
        .map(|file| EdgeRow {
            from_key: parent_key(file, paths),
            to_key: ProjectPaths::rel_str(file),
            props: Properties::new(),
        })
        .collect();

    let mut batches = Vec::new();
    if !folder_rows.is_empty() {
        batches.push(MutationBatch::Nodes(NodeBatch {
            label: NodeLabel::Folder,
            extra_label: None,
            rows: folder_rows,
        }));
    }
    if !file_rows.is_empty() {
        batches.push(MutationBatch::Nodes(NodeBatch {
            label: NodeLabel::File,
            extra_label: None,
            rows: file_rows,
        }));
    }
    if !folder_contains.is_empty() {
        batches.push(MutationBatch::Edges(EdgeBatch {
            edge_type: EdgeType::Contains,
            from: NodeLabel::Folder,
            to: NodeLabel::Folder,
            semantics: WriteSemantics::Merge,
            rows: folder_contains,
        }));
    }
    if !file_contains.is_empty() {
        batches.push(MutationBatch::Edges(EdgeBatch {
            edge_type: EdgeType::Contains,
            from: NodeLabel::Folder,
            to: NodeLabel::File,
            semantics: WriteSemantics::Merge,
            rows: file_contains,
        }));
    }
    batches
}

fn symbol_label(kind: SymbolKind) -> Option<NodeLabel> {
    match kind {
        SymbolKind::Function => Some(NodeLabel::Function),
        SymbolKind::Class | SymbolKind::Struct | SymbolKind::Union | SymbolKind::Enum => {
            Some(NodeLabel::DataStructure)
        }
        _ => None,
    }
}

/// Pass P2: one node per Function or DataStructure symbol.
pub fn plan_symbol_nodes(graph: &SymbolGraph, paths: &ProjectPaths) -> Vec<MutationBatch> {
    let mut function_rows = Vec::new();
    let mut structure_rows = Vec::new();

    for symbol in graph.symbols.values() {
        let Some(label) = symbol_label(symbol.kind) else {
            continue;
        };

        let mut props = Properties::new();
        props.insert("id".into(), json!(symbol.id.to_string()));
        props.insert("name".into(), json!(symbol.name));
        props.insert("scope".into(), json!(symbol.scope));
        props.insert("language".into(), json!(symbol.language));
        props.insert("has_definition".into(), json!(symbol.definition.is_some()));

        if let Some(location) = symbol.primary_location() {
            let path = match paths.uri_to_rel(&location.file_uri) {
                Ok(rel) => ProjectPaths::rel_str(&rel),
                // External symbols keep their absolute path.
                Err(_) => paths
                    .uri_to_abs(&location.file_uri)
                    .map(|p| p.to_string_lossy().into_owned())
                    .unwrap_or_else(|_| location.file_uri.clone()),
            };
            props.insert("path".into(), json!(path));
            props.insert("location".into(), json!([location.line, location.column]));
        }

        match label {
            NodeLabel::Function => {
                props.insert("signature".into(), json!(symbol.signature));
                props.insert("return_type".into(), json!(symbol.return_type));
                if let Some(span) = &symbol.body_location {
                    props.insert(
                        "body_location".into(),
                        json!([
                            span.start_line,
                            span.start_column,
                            span.end_line,
                            span.end_column
                        ]),
                    );
                }
                function_rows.push(NodeRow {
                    key: symbol.id.to_string(),
                    props,
                });
            }
            _ => {
                props.insert("kind".into(), json!(symbol.kind.as_str()));
                structure_rows.push(NodeRow {
                    key: symbol.id.to_string(),
                    props,
                });
            }
        }
    }

    function_rows.sort_by(|a, b| a.key.cmp(&b.key));
    structure_rows.sort_by(|a, b| a.key.cmp(&b.key));

    let mut batches = Vec::new();
    if !function_rows.is_empty() {
        batches.push(MutationBatch::Nodes(NodeBatch {
            label: NodeLabel::Function,
            extra_label: None,
            rows: function_rows,
        }));
    }
    if !structure_rows.is_empty() {
        batches.push(MutationBatch::Nodes(NodeBatch {
            label: NodeLabel::DataStructure,
            extra_label: None,
            rows: structure_rows,
        }));
    }
    batches
}

/// One (definition file) -DEFINES-> (symbol) edge, before planning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinesEdge {
    pub file: String,
    pub target: NodeLabel,
    pub id: SymbolId,
}

/// Pass P3 input: defines edges for every symbol defined inside the
/// project. Sorted for deterministic batch contents.
pub fn collect_defines_edges(graph: &SymbolGraph, paths: &ProjectPaths) -> Vec<DefinesEdge> {
    let mut edges: Vec<DefinesEdge> = graph
        .symbols
        .values()
        .filter_map(|symbol| {
            let target = symbol_label(symbol.kind)?;
            let definition = symbol.definition.as_ref()?;
            let rel = paths.uri_to_rel(&definition.file_uri).ok()?;
            Some(DefinesEdge {
                file: ProjectPaths::rel_str(&rel),
                target,
                id: symbol.id,
            })
        })
        .collect();
    edges.sort_by(|a, b| (&a.file, a.id).cmp(&(&b.file, b.id)));
    edges
}

/// Convert raw absolute include pairs into project-relative edges,
/// discarding pairs with an endpoint outside the root. Sorted and deduped.
pub fn normalize_includes(
    raw: &[(PathBuf, PathBuf)],
    paths: &ProjectPaths,
) -> Vec<IncludeEdge> {
    let mut filtered = 0usize;
    let mut edges: Vec<IncludeEdge> = raw
        .iter()
        .filter_map(|(including, included)| {
            match (paths.abs_to_rel(including), paths.abs_to_rel(included)) {
                (Ok(including), Ok(included)) => Some(IncludeEdge {
                    including,
                    included,
                }),
                _ => {
                    filtered += 1;
                    None
                }
            }
        })
        .collect();
    if filtered > 0 {
        debug!("filtered {filtered} include pairs outside the project root");
    }
    edges.sort_by(|a, b| (&a.including, &a.included).cmp(&(&b.including, &b.included)));
    edges.dedup();
    edges
}

/// Pass P4: INCLUDES edges between file nodes.
pub fn plan_include_edges(includes: &[IncludeEdge]) -> Option<MutationBatch> {
    if includes.is_empty() {
        return None;
    }
    let rows = includes
        .iter()
        .map(|edge| EdgeRow {
            from_key: ProjectPaths::rel_str(&edge.including),
            to_key: ProjectPaths::rel_str(&edge.included),
            props: Properties::new(),
        })
        .collect();
    Some(MutationBatch::Edges(EdgeBatch {
        edge_type: EdgeType::Includes,
        from: NodeLabel::File,
        to: NodeLabel::File,
        semantics: WriteSemantics::Merge,
        rows,
    }))
}
