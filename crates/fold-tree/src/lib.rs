#![deny(missing_docs)]

//! Immutable fold trees over working models and the builder that derives them.

mod builder;
mod hash;
pub mod patch;
mod serialization;
mod tree;

pub use builder::{FoldTreeBuilder, Segment, TreeBuildOptions};
pub use hash::canonical_hash;
pub use patch::{insert_bonded_leaf, remove_leaf};
pub use tree::{Edge, EdgeKind, FoldTree};

/// Re-export serialization helpers for downstream crates.
pub use serialization::{tree_from_bytes, tree_from_json, tree_to_bytes, tree_to_json, TREE_SCHEMA};
