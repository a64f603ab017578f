//! Span and include providers: the seam between the pipeline and the
//! external source-parsing tooling.
//!
//! The pipeline only ever sees the [`SourceInfoProvider`] trait. The
//! shipped implementations read the artefacts the external extractors
//! produce: a spans YAML stream (one document per file, with the name and
//! body ranges of every function definition) and a plain list of absolute
//! include pairs.

use crate::models::SpanRange;
use anyhow::{Context, Result};
use serde::Deserialize;
use serde_yaml::Value;
use std::path::{Path, PathBuf};
use tracing::debug;

/// One function definition span reported by the source parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionSpan {
    pub file_uri: String,
    pub name: String,
    /// Range of the function's name token; its start is the match key
    /// against the index's definition location.
    pub name_location: SpanRange,
    /// Full range of the function definition, body included.
    pub body_location: SpanRange,
}

/// Pure queries over the external source-parsing results.
pub trait SourceInfoProvider {
    /// Body spans for every function definition found in the project.
    fn function_spans(&self) -> Result<Vec<FunctionSpan>>;

    /// Directed (including, included) pairs as absolute paths.
    fn include_edges(&self) -> Result<Vec<(PathBuf, PathBuf)>>;
}

/// Provider with nothing to report. Used when no extractor output was
/// supplied on the command line.
#[derive(Debug, Default)]
pub struct EmptyProvider;

impl SourceInfoProvider for EmptyProvider {
    fn function_spans(&self) -> Result<Vec<FunctionSpan>> {
        Ok(Vec::new())
    }

    fn include_edges(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        Ok(Vec::new())
    }
}

/// File-backed provider reading pre-computed extractor artefacts.
#[derive(Debug, Default)]
pub struct FileProviders {
    pub spans_file: Option<PathBuf>,
    pub includes_file: Option<PathBuf>,
}

#[derive(Deserialize)]
struct PointDoc {
    #[serde(rename = "Line")]
    line: u32,
    #[serde(rename = "Column")]
    column: u32,
}

#[derive(Deserialize)]
struct RangeDoc {
    #[serde(rename = "Start")]
    start: PointDoc,
    #[serde(rename = "End")]
    end: PointDoc,
}

impl From<RangeDoc> for SpanRange {
    fn from(range: RangeDoc) -> Self {
        SpanRange {
            start_line: range.start.line,
            start_column: range.start.column,
            end_line: range.end.line,
            end_column: range.end.column,
        }
    }
}

#[derive(Deserialize)]
struct SpanFunctionDoc {
    #[serde(rename = "Name")]
    name: String,
    #[serde(rename = "NameLocation")]
    name_location: RangeDoc,
    #[serde(rename = "BodyLocation")]
    body_location: RangeDoc,
}

#[derive(Deserialize)]
struct SpanFileDoc {
    #[serde(rename = "FileURI")]
    file_uri: String,
    #[serde(rename = "Functions", default)]
    functions: Vec<SpanFunctionDoc>,
}

impl FileProviders {
    fn read_spans(&self, path: &Path) -> Result<Vec<FunctionSpan>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read spans file {}", path.display()))?;

        let mut spans = Vec::new();
        for de in serde_yaml::Deserializer::from_str(&content) {
            let value = Value::deserialize(de)
                .with_context(|| format!("malformed spans document in {}", path.display()))?;
            if value.is_null() {
                continue;
            }
            let file_doc: SpanFileDoc = serde_yaml::from_value(value)
                .with_context(|| format!("unexpected spans document in {}", path.display()))?;
            for function in file_doc.functions {
                spans.push(FunctionSpan {
                    file_uri: file_doc.file_uri.clone(),
                    name: function.name,
                    name_location: function.name_location.into(),
                    body_location: function.body_location.into(),
                });
            }
        }
        debug!("read {} function spans from {}", spans.len(), path.display());
        Ok(spans)
    }

    fn read_includes(&self, path: &Path) -> Result<Vec<(PathBuf, PathBuf)>> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read includes file {}", path.display()))?;

        let mut edges = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut parts = line.split_whitespace();
            if let (Some(including), Some(included)) = (parts.next(), parts.next()) {
                edges.push((PathBuf::from(including), PathBuf::from(included)));
            }
        }
        debug!("read {} include pairs from {}", edges.len(), path.display());
        Ok(edges)
    }
}

impl SourceInfoProvider for FileProviders {
    fn function_spans(&self) -> Result<Vec<FunctionSpan>> {
        match &self.spans_file {
            Some(path) => self.read_spans(path),
            None => Ok(Vec::new()),
        }
    }

    fn include_edges(&self) -> Result<Vec<(PathBuf, PathBuf)>> {
        match &self.includes_file {
            Some(path) => self.read_includes(path),
            None => Ok(Vec::new()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_read_spans_yaml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"---
FileURI: 'file:///p/src/x.c'
Functions:
  - Name: alpha
    NameLocation:
      Start: {{ Line: 10, Column: 5 }}
      End: {{ Line: 10, Column: 10 }}
    BodyLocation:
      Start: {{ Line: 10, Column: 1 }}
      End: {{ Line: 18, Column: 1 }}
  - Name: beta
    NameLocation:
      Start: {{ Line: 20, Column: 5 }}
      End: {{ Line: 20, Column: 9 }}
    BodyLocation:
      Start: {{ Line: 20, Column: 1 }}
      End: {{ Line: 25, Column: 1 }}
"#
        )
        .unwrap();

        let provider = FileProviders {
            spans_file: Some(file.path().to_path_buf()),
            includes_file: None,
        };
        let spans = provider.function_spans().unwrap();
        assert_eq!(spans.len(), 2);
        assert_eq!(spans[0].name, "alpha");
        assert_eq!(spans[0].file_uri, "file:///p/src/x.c");
        assert_eq!(spans[0].body_location.end_line, 18);
        assert_eq!(spans[1].name_location.start_line, 20);
    }

    #[test]
    fn test_read_includes_list() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# includes").unwrap();
        writeln!(file, "/p/src/x.c /p/include/h.h").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "/p/src/y.c\t/p/include/h.h").unwrap();

        let provider = FileProviders {
            spans_file: None,
            includes_file: Some(file.path().to_path_buf()),
        };
        let edges = provider.include_edges().unwrap();
        assert_eq!(
            edges,
            vec![
                (PathBuf::from("/p/src/x.c"), PathBuf::from("/p/include/h.h")),
                (PathBuf::from("/p/src/y.c"), PathBuf::from("/p/include/h.h")),
            ]
        );
    }

    #[test]
    fn test_empty_provider_reports_nothing() {
        let provider = EmptyProvider;
        assert!(provider.function_spans().unwrap().is_empty());
        assert!(provider.include_edges().unwrap().is_empty());
    }
}
