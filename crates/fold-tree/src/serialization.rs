use fold_core::errors::{ErrorInfo, FoldError};
use fold_core::provenance::SchemaVersion;
use fold_core::LocalPosition;
use serde::{Deserialize, Serialize};

use crate::tree::{Edge, FoldTree};

/// Schema of serialized fold trees.
pub const TREE_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Serializes the tree to a compact binary representation using `bincode`.
pub fn tree_to_bytes(tree: &FoldTree) -> Result<Vec<u8>, FoldError> {
    bincode::serialize(&SerializableTree::from(tree.clone()))
        .map_err(|err| FoldError::Serde(ErrorInfo::new("serialize-bytes", err.to_string())))
}

/// Restores and validates a tree from its binary representation.
pub fn tree_from_bytes(bytes: &[u8]) -> Result<FoldTree, FoldError> {
    let serializable: SerializableTree = bincode::deserialize(bytes)
        .map_err(|err| FoldError::Serde(ErrorInfo::new("deserialize-bytes", err.to_string())))?;
    FoldTree::try_from(serializable)
}

/// Serializes the tree to a JSON string.
pub fn tree_to_json(tree: &FoldTree) -> Result<String, FoldError> {
    serde_json::to_string_pretty(tree)
        .map_err(|err| FoldError::Serde(ErrorInfo::new("serialize-json", err.to_string())))
}

/// Restores and validates a tree from a JSON string.
pub fn tree_from_json(json: &str) -> Result<FoldTree, FoldError> {
    serde_json::from_str(json)
        .map_err(|err| FoldError::Serde(ErrorInfo::new("deserialize-json", err.to_string())))
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct SerializableTree {
    schema_version: SchemaVersion,
    size: usize,
    root: LocalPosition,
    edges: Vec<Edge>,
}

impl From<FoldTree> for SerializableTree {
    fn from(tree: FoldTree) -> Self {
        Self {
            schema_version: TREE_SCHEMA,
            size: tree.size(),
            root: tree.root(),
            edges: tree.edges().to_vec(),
        }
    }
}

impl TryFrom<SerializableTree> for FoldTree {
    type Error = FoldError;

    fn try_from(value: SerializableTree) -> Result<Self, Self::Error> {
        if !TREE_SCHEMA.accepts(&value.schema_version) {
            return Err(FoldError::Serde(
                ErrorInfo::new("schema-mismatch", "unsupported tree schema")
                    .with_context("found", format!("{:?}", value.schema_version)),
            ));
        }
        FoldTree::from_edges(value.size, value.root, value.edges)
    }
}
