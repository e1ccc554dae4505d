//! Leaf-level fast paths that avoid a full rebuild.

use fold_core::errors::{codes, ErrorInfo, FoldError};
use fold_core::LocalPosition;

use crate::tree::{invalid_tree, Edge, EdgeKind, FoldTree};

/// Inserts a new node at `new_local`, bonded to `anchor`.
///
/// Both positions use the numbering after insertion; nodes at or after
/// `new_local` shift up by one.
pub fn insert_bonded_leaf(
    tree: &FoldTree,
    new_local: LocalPosition,
    anchor: LocalPosition,
) -> Result<FoldTree, FoldError> {
    let size = tree.size() + 1;
    if new_local == 0 || new_local > size || anchor == 0 || anchor > size {
        return Err(invalid_tree("leaf insertion outside tree")
            .with_context("local", new_local)
            .with_context("anchor", anchor)
            .with_context("size", size));
    }
    if new_local.abs_diff(anchor) != 1 {
        return Err(invalid_tree("bonded leaf must sit next to its anchor")
            .with_context("local", new_local)
            .with_context("anchor", anchor));
    }
    if tree.is_empty() {
        return Err(invalid_tree("cannot attach a leaf to an empty tree"));
    }

    let shift = |local: LocalPosition| if local >= new_local { local + 1 } else { local };
    let mut edges: Vec<Edge> = tree
        .edges()
        .iter()
        .map(|edge| Edge {
            start: shift(edge.start),
            stop: shift(edge.stop),
            ..edge.clone()
        })
        .collect();
    if let Some(stretched) = edges
        .iter()
        .find(|edge| edge.kind == EdgeKind::Bond && edge.start.abs_diff(edge.stop) != 1)
    {
        return Err(invalid_tree("insertion would split a bonded pair")
            .with_context("start", stretched.start)
            .with_context("stop", stretched.stop));
    }
    edges.push(Edge::bond(anchor, new_local));
    FoldTree::from_edges(size, shift(tree.root()), edges)
}

/// Removes the non-root leaf at `local`; later nodes shift down by one.
pub fn remove_leaf(tree: &FoldTree, local: LocalPosition) -> Result<FoldTree, FoldError> {
    if local == tree.root() || !tree.is_leaf(local) || tree.size() < 2 {
        return Err(FoldError::Structure(
            ErrorInfo::new(codes::NOT_A_LEAF, "node is not a removable leaf")
                .with_context("local", local)
                .with_context("root", tree.root())
                .with_context("size", tree.size()),
        ));
    }
    let shift = |l: LocalPosition| if l > local { l - 1 } else { l };
    let edges = tree
        .edges()
        .iter()
        .filter(|edge| !edge.touches(local))
        .map(|edge| Edge {
            start: shift(edge.start),
            stop: shift(edge.stop),
            ..edge.clone()
        })
        .collect();
    FoldTree::from_edges(tree.size() - 1, shift(tree.root()), edges)
}
