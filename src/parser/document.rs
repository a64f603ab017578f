//! Classifies one YAML document from the index stream.
//!
//! Documents are tagged `!Symbol` or `!Refs`; classification goes by the
//! fields the tags imply (`ID` + `SymInfo` marks a symbol, `ID` +
//! `References` without `SymInfo` marks a reference list), so unknown tags
//! and malformed documents fall through to `Skipped` silently.

use crate::models::{Location, RefKind, Reference, Symbol, SymbolId, SymbolKind};
use serde_yaml::Value;

#[derive(Debug)]
pub enum ParsedDoc {
    Symbol(Symbol),
    Refs {
        target: SymbolId,
        refs: Vec<Reference>,
    },
    Skipped,
}

/// Strip the `!Symbol` / `!Refs` tag wrapper, if any.
fn untag(value: &Value) -> &Value {
    match value {
        Value::Tagged(tagged) => &tagged.value,
        other => other,
    }
}

fn str_field<'a>(value: &'a Value, key: &str) -> Option<&'a str> {
    value.get(key).and_then(Value::as_str)
}

fn owned_str_field(value: &Value, key: &str) -> String {
    str_field(value, key).unwrap_or_default().to_string()
}

fn u32_field(value: &Value, key: &str) -> Option<u32> {
    value.get(key).and_then(Value::as_u64).map(|v| v as u32)
}

/// `{FileURI, Start: {Line, Column}, ...}` → point location at `Start`.
fn location(value: &Value) -> Option<Location> {
    let file_uri = str_field(value, "FileURI")?.to_string();
    let start = value.get("Start")?;
    Some(Location {
        file_uri,
        line: u32_field(start, "Line")?,
        column: u32_field(start, "Column")?,
    })
}

/// `Container` is either `{ID: ...}` or a bare id string; the zero id means
/// "no container".
fn container(entry: &Value) -> Option<SymbolId> {
    let field = entry.get("Container")?;
    let raw = match field {
        Value::Mapping(_) => str_field(field, "ID")?,
        Value::String(s) => s.as_str(),
        _ => return None,
    };
    let id: SymbolId = raw.parse().ok()?;
    if id.is_none() {
        None
    } else {
        Some(id)
    }
}

fn parse_symbol(doc: &Value, id: SymbolId) -> Symbol {
    let sym_info = doc.get("SymInfo");
    let kind = sym_info
        .and_then(|si| str_field(si, "Kind"))
        .map(SymbolKind::from_index)
        .unwrap_or(SymbolKind::Other);
    let language = sym_info
        .and_then(|si| str_field(si, "Lang"))
        .unwrap_or_default()
        .to_string();

    Symbol {
        id,
        name: owned_str_field(doc, "Name"),
        kind,
        scope: owned_str_field(doc, "Scope"),
        language,
        signature: owned_str_field(doc, "Signature"),
        return_type: owned_str_field(doc, "ReturnType"),
        declaration: doc.get("CanonicalDeclaration").and_then(location),
        definition: doc.get("Definition").and_then(location),
        references: Vec::new(),
        body_location: None,
    }
}

fn parse_refs(doc: &Value) -> Vec<Reference> {
    let Some(entries) = doc.get("References").and_then(Value::as_sequence) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let kind = RefKind(entry.get("Kind").and_then(Value::as_u64)? as u32);
            let loc = location(entry.get("Location")?)?;
            Some(Reference {
                kind,
                location: loc,
                container: container(entry),
            })
        })
        .collect()
}

pub fn classify(value: &Value) -> ParsedDoc {
    let doc = untag(value);
    if !matches!(doc, Value::Mapping(_)) {
        return ParsedDoc::Skipped;
    }
    let Some(id) = str_field(doc, "ID").and_then(|s| s.parse::<SymbolId>().ok()) else {
        return ParsedDoc::Skipped;
    };

    if doc.get("SymInfo").is_some() {
        ParsedDoc::Symbol(parse_symbol(doc, id))
    } else if doc.get("References").is_some() {
        ParsedDoc::Refs {
            target: id,
            refs: parse_refs(doc),
        }
    } else {
        ParsedDoc::Skipped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(yaml: &str) -> ParsedDoc {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        classify(&value)
    }

    #[test]
    fn test_symbol_document() {
        let doc = parse(
            r#"
!Symbol
ID: 'AAAAAAAAAAAAAAAA'
Name: frobnicate
Scope: 'ns::'
SymInfo:
  Kind: Function
  Lang: Cpp
Signature: (int x)
ReturnType: int
CanonicalDeclaration:
  FileURI: 'file:///p/src/x.h'
  Start: { Line: 3, Column: 5 }
  End: { Line: 3, Column: 15 }
Definition:
  FileURI: 'file:///p/src/x.c'
  Start: { Line: 10, Column: 5 }
  End: { Line: 10, Column: 15 }
"#,
        );
        let ParsedDoc::Symbol(sym) = doc else {
            panic!("expected symbol");
        };
        assert_eq!(sym.name, "frobnicate");
        assert_eq!(sym.kind, SymbolKind::Function);
        assert_eq!(sym.scope, "ns::");
        assert_eq!(sym.signature, "(int x)");
        assert_eq!(sym.return_type, "int");
        let def = sym.definition.unwrap();
        assert_eq!(def.file_uri, "file:///p/src/x.c");
        assert_eq!((def.line, def.column), (10, 5));
        assert!(sym.declaration.is_some());
    }

    #[test]
    fn test_refs_document_with_container() {
        let doc = parse(
            r#"
!Refs
ID: 'BBBBBBBBBBBBBBBB'
References:
  - Kind: 20
    Location:
      FileURI: 'file:///p/src/x.c'
      Start: { Line: 12, Column: 9 }
      End: { Line: 12, Column: 20 }
    Container:
      ID: 'AAAAAAAAAAAAAAAA'
"#,
        );
        let ParsedDoc::Refs { target, refs } = doc else {
            panic!("expected refs");
        };
        assert_eq!(target, "BBBBBBBBBBBBBBBB".parse().unwrap());
        assert_eq!(refs.len(), 1);
        assert_eq!(refs[0].kind, RefKind(20));
        assert_eq!(refs[0].container, Some("AAAAAAAAAAAAAAAA".parse().unwrap()));
    }

    #[test]
    fn test_zero_container_means_no_container() {
        let doc = parse(
            r#"
!Refs
ID: 'BBBBBBBBBBBBBBBB'
References:
  - Kind: 20
    Location:
      FileURI: 'file:///p/src/x.c'
      Start: { Line: 12, Column: 9 }
      End: { Line: 12, Column: 20 }
    Container:
      ID: '0000000000000000'
"#,
        );
        let ParsedDoc::Refs { refs, .. } = doc else {
            panic!("expected refs");
        };
        assert_eq!(refs[0].container, None);
    }

    #[test]
    fn test_unknown_document_is_skipped() {
        assert!(matches!(parse("Foo: bar"), ParsedDoc::Skipped));
        assert!(matches!(parse("!Other\nID: 'AA'"), ParsedDoc::Skipped));
        assert!(matches!(parse("[1, 2, 3]"), ParsedDoc::Skipped));
    }

    #[test]
    fn test_refs_without_location_are_dropped() {
        let doc = parse(
            r#"
!Refs
ID: 'CCCCCCCCCCCCCCCC'
References:
  - Kind: 4
"#,
        );
        let ParsedDoc::Refs { refs, .. } = doc else {
            panic!("expected refs");
        };
        assert!(refs.is_empty());
    }
}
