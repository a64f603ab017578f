//! Core data model for the symbol graph
//!
//! These types mirror the records of the clangd index stream: symbols,
//! references, locations, and the call relations derived from them. The
//! whole model is serde-serialisable so the linked graph can be snapshotted
//! to the parse cache.

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// A symbol identifier: 16 hex characters in the index, stored as a `u64`.
///
/// The all-zero identifier is the index's "no container" marker and is never
/// a real symbol.
#[derive(
    Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct SymbolId(u64);

impl SymbolId {
    /// The "no container" marker (`0000000000000000`).
    pub const NONE: SymbolId = SymbolId(0);

    pub fn is_none(self) -> bool {
        self.0 == 0
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl FromStr for SymbolId {
    type Err = SymbolIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if s.is_empty() || s.len() > 16 || !s.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(SymbolIdError(s.to_string()));
        }
        let raw = u64::from_str_radix(s, 16).map_err(|_| SymbolIdError(s.to_string()))?;
        Ok(SymbolId(raw))
    }
}

impl fmt::Display for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016X}", self.0)
    }
}

impl fmt::Debug for SymbolId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "SymbolId({:016X})", self.0)
    }
}

#[derive(Debug, thiserror::Error)]
#[error("invalid symbol id: {0:?}")]
pub struct SymbolIdError(String);

/// Symbol kinds from the index, as a closed set.
///
/// Kind strings the graph does not model (constructors, namespaces, ...)
/// collapse into `Other`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SymbolKind {
    Function,
    Class,
    Struct,
    Union,
    Enum,
    Variable,
    Field,
    Macro,
    Other,
}

impl SymbolKind {
    pub fn from_index(kind: &str) -> Self {
        match kind {
            "Function" => SymbolKind::Function,
            "Class" => SymbolKind::Class,
            "Struct" => SymbolKind::Struct,
            "Union" => SymbolKind::Union,
            "Enum" => SymbolKind::Enum,
            "Variable" => SymbolKind::Variable,
            "Field" => SymbolKind::Field,
            "Macro" => SymbolKind::Macro,
            _ => SymbolKind::Other,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SymbolKind::Function => "Function",
            SymbolKind::Class => "Class",
            SymbolKind::Struct => "Struct",
            SymbolKind::Union => "Union",
            SymbolKind::Enum => "Enum",
            SymbolKind::Variable => "Variable",
            SymbolKind::Field => "Field",
            SymbolKind::Macro => "Macro",
            SymbolKind::Other => "Other",
        }
    }

    /// Whether symbols of this kind become graph nodes.
    pub fn is_graph_node(self) -> bool {
        matches!(
            self,
            SymbolKind::Function
                | SymbolKind::Class
                | SymbolKind::Struct
                | SymbolKind::Union
                | SymbolKind::Enum
        )
    }
}

/// The bit-kind field of a reference record.
///
/// Only four values mark calls: 4 and 12 in the legacy index format (no
/// container provenance), 20 and 28 in the modern format (container
/// present).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefKind(pub u32);

impl RefKind {
    pub fn is_call(self) -> bool {
        self.is_legacy_call() || self.is_container_call()
    }

    /// Call in the legacy index format (value 4 or 12).
    pub fn is_legacy_call(self) -> bool {
        matches!(self.0, 4 | 12)
    }

    /// Call in the container-carrying index format (value 20 or 28).
    pub fn is_container_call(self) -> bool {
        matches!(self.0, 20 | 28)
    }
}

/// A single point in a file: URI plus 1-based line and column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Location {
    pub file_uri: String,
    pub line: u32,
    pub column: u32,
}

/// A line/column range without a file, used in span tables where the file
/// is supplied by context.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanRange {
    pub start_line: u32,
    pub start_column: u32,
    pub end_line: u32,
    pub end_column: u32,
}

impl SpanRange {
    /// Whether a point falls inside the range, boundaries included.
    pub fn contains(&self, line: u32, column: u32) -> bool {
        (self.start_line, self.start_column) <= (line, column)
            && (line, column) <= (self.end_line, self.end_column)
    }
}

/// A usage site of a symbol.
///
/// `container` names the function whose body lexically holds the site; the
/// parser maps the index's zero marker to `None`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub kind: RefKind,
    pub location: Location,
    pub container: Option<SymbolId>,
}

/// One symbol from the index, with its references attached after the link
/// phase and (for functions) a body span attached by the span provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Symbol {
    pub id: SymbolId,
    pub name: String,
    pub kind: SymbolKind,
    pub scope: String,
    pub language: String,
    pub signature: String,
    pub return_type: String,
    pub declaration: Option<Location>,
    pub definition: Option<Location>,
    pub references: Vec<Reference>,
    pub body_location: Option<SpanRange>,
}

impl Symbol {
    pub fn is_function(&self) -> bool {
        self.kind == SymbolKind::Function
    }

    /// Definition site if present, else the canonical declaration.
    pub fn primary_location(&self) -> Option<&Location> {
        self.definition.as_ref().or(self.declaration.as_ref())
    }
}

/// A directed caller → callee edge at one call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CallRelation {
    pub caller: SymbolId,
    pub callee: SymbolId,
    pub site: Location,
}

/// A directed include edge, both endpoints project-relative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncludeEdge {
    pub including: PathBuf,
    pub included: PathBuf,
}

/// The fully linked symbol map plus the format flag that drives call-graph
/// strategy selection.
///
/// Built mutably by the parser, then read-only for every downstream pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SymbolGraph {
    pub symbols: FxHashMap<SymbolId, Symbol>,
    /// True iff at least one reference carried a non-zero container id.
    pub has_container_field: bool,
}

impl SymbolGraph {
    pub fn get(&self, id: SymbolId) -> Option<&Symbol> {
        self.symbols.get(&id)
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn functions(&self) -> impl Iterator<Item = &Symbol> {
        self.symbols.values().filter(|s| s.is_function())
    }

    pub fn function_count(&self) -> usize {
        self.functions().count()
    }

    pub fn reference_count(&self) -> usize {
        self.symbols.values().map(|s| s.references.len()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_symbol_id_round_trip() {
        let id: SymbolId = "1A2B3C4D5E6F7081".parse().unwrap();
        assert_eq!(id.to_string(), "1A2B3C4D5E6F7081");
        let back: SymbolId = id.to_string().parse().unwrap();
        assert_eq!(id, back);
    }

    #[test]
    fn test_symbol_id_zero_is_none() {
        let id: SymbolId = "0000000000000000".parse().unwrap();
        assert!(id.is_none());
        assert_eq!(id, SymbolId::NONE);
    }

    #[test]
    fn test_symbol_id_rejects_garbage() {
        assert!("".parse::<SymbolId>().is_err());
        assert!("xyz".parse::<SymbolId>().is_err());
        assert!("+123".parse::<SymbolId>().is_err());
        assert!("0123456789ABCDEF0".parse::<SymbolId>().is_err());
    }

    #[test]
    fn test_call_kind_bits() {
        assert!(RefKind(4).is_legacy_call());
        assert!(RefKind(12).is_legacy_call());
        assert!(RefKind(20).is_container_call());
        assert!(RefKind(28).is_container_call());
        for bits in [0, 1, 2, 8, 16, 24, 32] {
            assert!(!RefKind(bits).is_call(), "bits {bits} is not a call");
        }
    }

    #[test]
    fn test_kind_mapping() {
        assert_eq!(SymbolKind::from_index("Struct"), SymbolKind::Struct);
        assert_eq!(SymbolKind::from_index("Constructor"), SymbolKind::Other);
        assert!(SymbolKind::Enum.is_graph_node());
        assert!(!SymbolKind::Variable.is_graph_node());
        assert!(!SymbolKind::Macro.is_graph_node());
    }

    #[test]
    fn test_span_contains_boundaries() {
        let span = SpanRange {
            start_line: 10,
            start_column: 5,
            end_line: 18,
            end_column: 2,
        };
        assert!(span.contains(10, 5));
        assert!(span.contains(12, 9));
        assert!(span.contains(18, 2));
        assert!(!span.contains(10, 4));
        assert!(!span.contains(18, 3));
        assert!(!span.contains(19, 1));
    }

    #[test]
    fn test_primary_location_prefers_definition() {
        let decl = Location {
            file_uri: "file:///p/a.h".into(),
            line: 1,
            column: 1,
        };
        let def = Location {
            file_uri: "file:///p/a.c".into(),
            line: 5,
            column: 1,
        };
        let mut sym = Symbol {
            id: "AA".parse().unwrap(),
            name: "f".into(),
            kind: SymbolKind::Function,
            scope: String::new(),
            language: String::new(),
            signature: String::new(),
            return_type: String::new(),
            declaration: Some(decl.clone()),
            definition: Some(def.clone()),
            references: Vec::new(),
            body_location: None,
        };
        assert_eq!(sym.primary_location(), Some(&def));
        sym.definition = None;
        assert_eq!(sym.primary_location(), Some(&decl));
    }
}
