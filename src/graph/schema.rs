//! Labels, edge types, and uniqueness constraints of the code graph.

use serde::{Deserialize, Serialize};

/// Node labels. The project node additionally carries the `FOLDER` label so
/// containment queries can treat it as the root folder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeLabel {
    Project,
    Folder,
    File,
    Function,
    DataStructure,
}

impl NodeLabel {
    pub fn as_str(self) -> &'static str {
        match self {
            NodeLabel::Project => "PROJECT",
            NodeLabel::Folder => "FOLDER",
            NodeLabel::File => "FILE",
            NodeLabel::Function => "FUNCTION",
            NodeLabel::DataStructure => "DATA_STRUCTURE",
        }
    }

    /// The property the label is keyed (and constrained unique) on.
    pub fn key_property(self) -> &'static str {
        match self {
            NodeLabel::Project | NodeLabel::Folder | NodeLabel::File => "path",
            NodeLabel::Function | NodeLabel::DataStructure => "id",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeType {
    Contains,
    Defines,
    Includes,
    Calls,
}

impl EdgeType {
    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::Defines => "DEFINES",
            EdgeType::Includes => "INCLUDES",
            EdgeType::Calls => "CALLS",
        }
    }
}

/// A uniqueness constraint on `(label, key property)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConstraintSpec {
    pub label: NodeLabel,
    pub property: &'static str,
}

/// The constraints every run ensures before writing.
pub fn constraints() -> Vec<ConstraintSpec> {
    [
        NodeLabel::File,
        NodeLabel::Folder,
        NodeLabel::Function,
        NodeLabel::DataStructure,
    ]
    .into_iter()
    .map(|label| ConstraintSpec {
        label,
        property: label.key_property(),
    })
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_properties() {
        assert_eq!(NodeLabel::File.key_property(), "path");
        assert_eq!(NodeLabel::Function.key_property(), "id");
        assert_eq!(NodeLabel::DataStructure.key_property(), "id");
    }

    #[test]
    fn test_constraint_set_covers_keyed_labels() {
        let specs = constraints();
        assert_eq!(specs.len(), 4);
        assert!(specs
            .iter()
            .any(|s| s.label == NodeLabel::Function && s.property == "id"));
        assert!(specs
            .iter()
            .any(|s| s.label == NodeLabel::File && s.property == "path"));
    }
}
