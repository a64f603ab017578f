//! Renders mutation batches to Cypher.
//!
//! Two forms: the parameterised statements a server-backed adapter submits
//! (label-typed MATCH clauses throughout, so the planner's endpoint lookups
//! ride the label indexes), and a parameter-inlined script stream for
//! running against a server out-of-band.

use super::schema::{ConstraintSpec, EdgeType, NodeLabel};
use super::store::{
    EdgeBatch, GraphQuery, GraphStore, GroupedEdgeBatch, MutationBatch, NodeBatch, Properties,
    WriteSemantics, WriteSummary,
};
use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// A parameterised statement ready for submission.
#[derive(Debug, Clone)]
pub struct Statement {
    pub text: String,
    pub params: Properties,
}

fn semantics_keyword(semantics: WriteSemantics) -> &'static str {
    match semantics {
        WriteSemantics::Create => "CREATE",
        WriteSemantics::Merge => "MERGE",
    }
}

fn node_pattern(label: NodeLabel, extra: Option<NodeLabel>, key_expr: &str) -> String {
    let labels = match extra {
        Some(extra) => format!("{}:{}", label.as_str(), extra.as_str()),
        None => label.as_str().to_string(),
    };
    format!("(n:{labels} {{{}: {key_expr}}})", label.key_property())
}

/// Inner clause shared by flat and grouped edge batches.
fn edge_clause(edge_type: EdgeType, from: NodeLabel, to: NodeLabel, semantics: WriteSemantics) -> String {
    format!(
        "MATCH (a:{} {{{}: row.from}}) MATCH (b:{} {{{}: row.to}}) {} (a)-[r:{}]->(b) SET r += row.props",
        from.as_str(),
        from.key_property(),
        to.as_str(),
        to.key_property(),
        semantics_keyword(semantics),
        edge_type.as_str(),
    )
}

pub fn render_nodes(batch: &NodeBatch) -> Statement {
    let text = format!(
        "UNWIND $rows AS row MERGE {} SET n += row.props",
        node_pattern(batch.label, batch.extra_label, "row.key"),
    );
    let rows: Vec<Value> = batch
        .rows
        .iter()
        .map(|r| json!({"key": r.key, "props": r.props}))
        .collect();
    let mut params = Properties::new();
    params.insert("rows".into(), Value::Array(rows));
    Statement { text, params }
}

pub fn render_edges(batch: &EdgeBatch) -> Statement {
    let text = format!(
        "UNWIND $rows AS row {}",
        edge_clause(batch.edge_type, batch.from, batch.to, batch.semantics),
    );
    let rows: Vec<Value> = batch
        .rows
        .iter()
        .map(|r| json!({"from": r.from_key, "to": r.to_key, "props": r.props}))
        .collect();
    let mut params = Properties::new();
    params.insert("rows".into(), Value::Array(rows));
    Statement { text, params }
}

/// The server-side iteration form: one group per iteration item, committed
/// every `server_batch_size` groups, parallelised across groups.
pub fn render_grouped_edges(batch: &GroupedEdgeBatch) -> Statement {
    let inner = format!(
        "UNWIND grp.rows AS row {}",
        edge_clause(batch.edge_type, batch.from, batch.to, batch.semantics),
    );
    let text = format!(
        "CALL apoc.periodic.iterate('UNWIND $groups AS grp RETURN grp', '{}', \
         {{batchSize: {}, parallel: true, params: {{groups: $groups}}}})",
        inner.replace('\'', "\\'"),
        batch.server_batch_size,
    );
    let groups: Vec<Value> = batch
        .groups
        .iter()
        .map(|g| {
            let rows: Vec<Value> = g
                .rows
                .iter()
                .map(|r| json!({"from": r.from_key, "to": r.to_key, "props": r.props}))
                .collect();
            json!({"key": g.key, "rows": rows})
        })
        .collect();
    let mut params = Properties::new();
    params.insert("groups".into(), Value::Array(groups));
    Statement { text, params }
}

pub const RESET_STATEMENT: &str = "MATCH (n) DETACH DELETE n";
pub const DELETE_ORPHANS_STATEMENT: &str =
    "MATCH (n) WHERE COUNT { (n)--() } = 0 DETACH DELETE n";

pub fn render_constraint(spec: &ConstraintSpec) -> String {
    format!(
        "CREATE CONSTRAINT IF NOT EXISTS FOR (n:{}) REQUIRE n.{} IS UNIQUE",
        spec.label.as_str(),
        spec.property,
    )
}

pub fn render_vector_index(label: NodeLabel, property: &str, dims: usize) -> String {
    format!(
        "CREATE VECTOR INDEX {}_{} IF NOT EXISTS FOR (n:{}) ON (n.{}) \
         OPTIONS {{indexConfig: {{`vector.dimensions`: {}, `vector.similarity_function`: 'cosine'}}}}",
        label.as_str().to_lowercase(),
        property,
        label.as_str(),
        property,
        dims,
    )
}

// ---- literal inlining for the script form ----

/// JSON value → Cypher literal. Map keys in this codebase are plain
/// identifiers, so they render bare.
fn literal(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        // JSON string escaping is a subset of Cypher's double-quoted form.
        Value::String(_) => serde_json::to_string(value).expect("string literal"),
        Value::Array(items) => {
            let rendered: Vec<String> = items.iter().map(literal).collect();
            format!("[{}]", rendered.join(", "))
        }
        Value::Object(map) => {
            let rendered: Vec<String> = map
                .iter()
                .map(|(k, v)| format!("{k}: {}", literal(v)))
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }
    }
}

/// `UNWIND $rows ...` with the row list inlined as a literal; the
/// parameter name occurs exactly once in these statement forms.
fn inline_rows(statement: &Statement) -> String {
    let rows = statement.params.get("rows").cloned().unwrap_or(Value::Null);
    statement.text.replace("$rows", &literal(&rows))
}

/// The script form of a grouped batch: the same iteration call, with the
/// group list inlined into the params map. The `$groups` reference inside
/// the quoted iteration query stays a parameter; the iteration procedure
/// supplies it from the params map.
fn inline_grouped(batch: &GroupedEdgeBatch) -> String {
    let statement = render_grouped_edges(batch);
    let groups = statement.params.get("groups").cloned().unwrap_or(Value::Null);
    statement.text.replace(
        "params: {groups: $groups}",
        &format!("params: {{groups: {}}}", literal(&groups)),
    )
}

/// Adapter that renders every submission into a runnable `.cypher` script,
/// one statement per batch, parameters inlined.
pub struct CypherScriptWriter {
    out: Mutex<BufWriter<File>>,
    path: PathBuf,
}

impl CypherScriptWriter {
    pub fn create(path: &Path) -> Result<Self> {
        let file = File::create(path)
            .with_context(|| format!("failed to create cypher script {}", path.display()))?;
        Ok(Self {
            out: Mutex::new(BufWriter::new(file)),
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_lines(&self, lines: &[String]) -> Result<()> {
        let mut out = self.out.lock().expect("script writer lock poisoned");
        for line in lines {
            writeln!(out, "{line};")?;
        }
        Ok(())
    }
}

impl GraphStore for CypherScriptWriter {
    fn reset(&self) -> Result<()> {
        self.write_lines(&[RESET_STATEMENT.to_string()])
    }

    fn ensure_constraints(&self, specs: &[ConstraintSpec]) -> Result<()> {
        let lines: Vec<String> = specs.iter().map(render_constraint).collect();
        self.write_lines(&lines)
    }

    fn submit(&self, batch: &MutationBatch) -> Result<WriteSummary> {
        let mut summary = WriteSummary::default();
        match batch {
            MutationBatch::Nodes(nodes) => {
                self.write_lines(&[inline_rows(&render_nodes(nodes))])?;
                summary.nodes_written = nodes.rows.len();
            }
            MutationBatch::Edges(edges) => {
                self.write_lines(&[inline_rows(&render_edges(edges))])?;
                summary.edges_written = edges.rows.len();
            }
            MutationBatch::GroupedEdges(grouped) => {
                self.write_lines(&[inline_grouped(grouped)])?;
                summary.edges_written = grouped.edge_count();
            }
            MutationBatch::DeleteOrphans => {
                self.write_lines(&[DELETE_ORPHANS_STATEMENT.to_string()])?;
            }
        }
        Ok(summary)
    }

    fn query(&self, _query: &GraphQuery) -> Result<Vec<Value>> {
        bail!("the cypher script writer is write-only");
    }

    fn create_vector_index(&self, label: NodeLabel, property: &str, dims: usize) -> Result<()> {
        self.write_lines(&[render_vector_index(label, property, dims)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::store::{EdgeGroup, EdgeRow, NodeRow};
    use serde_json::Map;

    #[test]
    fn test_edge_statement_is_label_typed() {
        let batch = EdgeBatch {
            edge_type: EdgeType::Defines,
            from: NodeLabel::File,
            to: NodeLabel::Function,
            semantics: WriteSemantics::Create,
            rows: vec![EdgeRow {
                from_key: "src/x.c".into(),
                to_key: "AA".into(),
                props: Map::new(),
            }],
        };
        let stmt = render_edges(&batch);
        assert!(stmt.text.contains("MATCH (a:FILE {path: row.from})"));
        assert!(stmt.text.contains("MATCH (b:FUNCTION {id: row.to})"));
        assert!(stmt.text.contains("CREATE (a)-[r:DEFINES]->(b)"));
        assert_eq!(stmt.params["rows"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_grouped_statement_carries_batch_size() {
        let batch = GroupedEdgeBatch {
            edge_type: EdgeType::Calls,
            from: NodeLabel::Function,
            to: NodeLabel::Function,
            semantics: WriteSemantics::Merge,
            server_batch_size: 7,
            groups: vec![EdgeGroup {
                key: "src/x.c".into(),
                rows: vec![EdgeRow {
                    from_key: "AA".into(),
                    to_key: "BB".into(),
                    props: Map::new(),
                }],
            }],
        };
        let stmt = render_grouped_edges(&batch);
        assert!(stmt.text.contains("apoc.periodic.iterate"));
        assert!(stmt.text.contains("batchSize: 7"));
        assert!(stmt.text.contains("parallel: true"));
        assert!(stmt.text.contains("MERGE (a)-[r:CALLS]->(b)"));
    }

    #[test]
    fn test_node_statement_merges_on_key_property() {
        let batch = NodeBatch {
            label: NodeLabel::Folder,
            extra_label: None,
            rows: vec![NodeRow {
                key: "src".into(),
                props: Map::new(),
            }],
        };
        let stmt = render_nodes(&batch);
        assert!(stmt.text.contains("MERGE (n:FOLDER {path: row.key})"));
    }

    #[test]
    fn test_literal_escapes_strings() {
        assert_eq!(literal(&json!("plain")), "\"plain\"");
        assert_eq!(literal(&json!("with \"quotes\"")), r#""with \"quotes\"""#);
        assert_eq!(literal(&json!([1, 2])), "[1, 2]");
        assert_eq!(literal(&json!({"name": "x.c"})), "{name: \"x.c\"}");
    }

    #[test]
    fn test_script_writer_emits_runnable_statements() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.cypher");
        let writer = CypherScriptWriter::create(&path).unwrap();
        writer.reset().unwrap();
        writer
            .ensure_constraints(&crate::graph::schema::constraints())
            .unwrap();
        writer
            .submit(&MutationBatch::Nodes(NodeBatch {
                label: NodeLabel::File,
                extra_label: None,
                rows: vec![NodeRow {
                    key: "src/x.c".into(),
                    props: Map::new(),
                }],
            }))
            .unwrap();
        writer
            .submit(&MutationBatch::GroupedEdges(GroupedEdgeBatch {
                edge_type: EdgeType::Defines,
                from: NodeLabel::File,
                to: NodeLabel::Function,
                semantics: WriteSemantics::Create,
                server_batch_size: 2,
                groups: vec![EdgeGroup {
                    key: "src/x.c".into(),
                    rows: vec![EdgeRow {
                        from_key: "src/x.c".into(),
                        to_key: "AA".into(),
                        props: Map::new(),
                    }],
                }],
            }))
            .unwrap();
        drop(writer);

        let script = std::fs::read_to_string(&path).unwrap();
        assert!(script.starts_with("MATCH (n) DETACH DELETE n;"));
        assert!(script.contains("CREATE CONSTRAINT IF NOT EXISTS FOR (n:FILE)"));
        // The node batch stays in its UNWIND form with the rows inlined.
        assert!(script
            .contains("UNWIND [{key: \"src/x.c\", props: {}}] AS row MERGE (n:FILE {path: row.key})"));
        // Grouped batches keep the iteration call; only the params map is
        // inlined, the quoted query still refers to $groups.
        assert!(script.contains("'UNWIND $groups AS grp RETURN grp'"));
        assert!(script.contains("params: {groups: [{key: \"src/x.c\""));
    }
}
