use fold_core::errors::{codes, ErrorInfo, FoldError};
use fold_core::{GlobalSequenceModel, LocalPosition, Position};
use serde::{Deserialize, Serialize};

/// Connection type of a tree edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Covalent link between consecutive, sequence-adjacent locals.
    Bond,
    /// Rigid-body link between any two locals.
    Jump,
}

/// Directed tree edge; `start` is the endpoint nearer the root.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Edge {
    /// Parent-side endpoint.
    pub start: LocalPosition,
    /// Child-side endpoint.
    pub stop: LocalPosition,
    /// Connection type.
    pub kind: EdgeKind,
    /// Attachment label on the parent side.
    #[serde(default)]
    pub start_attachment: Option<String>,
    /// Attachment label on the child side.
    #[serde(default)]
    pub stop_attachment: Option<String>,
}

impl Edge {
    /// Creates a bond edge.
    pub fn bond(start: LocalPosition, stop: LocalPosition) -> Self {
        Self {
            start,
            stop,
            kind: EdgeKind::Bond,
            start_attachment: None,
            stop_attachment: None,
        }
    }

    /// Creates a jump edge without attachment labels.
    pub fn jump(start: LocalPosition, stop: LocalPosition) -> Self {
        Self {
            kind: EdgeKind::Jump,
            ..Self::bond(start, stop)
        }
    }

    /// Sets attachment labels on both endpoints.
    pub fn with_attachments(mut self, start: Option<String>, stop: Option<String>) -> Self {
        self.start_attachment = start;
        self.stop_attachment = stop;
        self
    }

    /// Returns `true` for jump edges.
    pub fn is_jump(&self) -> bool {
        self.kind == EdgeKind::Jump
    }

    /// Returns `true` if either endpoint is `local`.
    pub fn touches(&self, local: LocalPosition) -> bool {
        self.start == local || self.stop == local
    }

    /// Endpoint opposite to `local`.
    pub fn other(&self, local: LocalPosition) -> Option<LocalPosition> {
        if self.start == local {
            Some(self.stop)
        } else if self.stop == local {
            Some(self.start)
        } else {
            None
        }
    }

    fn flipped(self) -> Self {
        Self {
            start: self.stop,
            stop: self.start,
            kind: self.kind,
            start_attachment: self.stop_attachment,
            stop_attachment: self.start_attachment,
        }
    }
}

/// Immutable spanning tree over local positions `1..=size`.
///
/// Edges are stored oriented away from the root in discovery order of a
/// depth-first walk that expands smaller locals first, so two trees over the
/// same edge set and root compare equal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "crate::serialization::SerializableTree")]
#[serde(into = "crate::serialization::SerializableTree")]
pub struct FoldTree {
    size: usize,
    root: LocalPosition,
    edges: Vec<Edge>,
}

impl FoldTree {
    /// Tree of an emptied model.
    pub fn empty() -> Self {
        Self {
            size: 0,
            root: 0,
            edges: Vec::new(),
        }
    }

    /// Single-node tree.
    pub fn single() -> Self {
        Self {
            size: 1,
            root: 1,
            edges: Vec::new(),
        }
    }

    /// Validates `edges` as a spanning tree rooted at `root` and orients them.
    pub fn from_edges(
        size: usize,
        root: LocalPosition,
        edges: Vec<Edge>,
    ) -> Result<Self, FoldError> {
        if size == 0 {
            if root != 0 || !edges.is_empty() {
                return Err(invalid_tree("empty tree cannot carry a root or edges")
                    .with_context("root", root)
                    .with_context("edges", edges.len()));
            }
            return Ok(Self::empty());
        }
        if root == 0 || root > size {
            return Err(invalid_tree("root outside tree")
                .with_context("root", root)
                .with_context("size", size));
        }
        if edges.len() != size - 1 {
            return Err(invalid_tree("tree must have exactly size - 1 edges")
                .with_context("size", size)
                .with_context("edges", edges.len()));
        }

        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); size + 1];
        for (idx, edge) in edges.iter().enumerate() {
            for end in [edge.start, edge.stop] {
                if end == 0 || end > size {
                    return Err(invalid_tree("edge endpoint outside tree")
                        .with_context("start", edge.start)
                        .with_context("stop", edge.stop)
                        .with_context("size", size));
                }
            }
            if edge.start == edge.stop {
                return Err(invalid_tree("self loop").with_context("local", edge.start));
            }
            if edge.kind == EdgeKind::Bond && edge.start.abs_diff(edge.stop) != 1 {
                return Err(invalid_tree("bond edge must join consecutive locals")
                    .with_context("start", edge.start)
                    .with_context("stop", edge.stop));
            }
            adjacency[edge.start].push(idx);
            adjacency[edge.stop].push(idx);
        }
        for (local, incident) in adjacency.iter_mut().enumerate() {
            incident.sort_by_key(|&idx| edges[idx].other(local));
        }

        let mut visited = vec![false; size + 1];
        let mut used = vec![false; edges.len()];
        let mut ordered = Vec::with_capacity(edges.len());
        let mut stack = vec![root];
        visited[root] = true;
        while let Some(node) = stack.pop() {
            let mut children = Vec::new();
            for &idx in &adjacency[node] {
                if used[idx] {
                    continue;
                }
                used[idx] = true;
                let edge = &edges[idx];
                let child = edge.other(node).unwrap_or(node);
                if visited[child] {
                    return Err(invalid_tree("cycle detected").with_context("local", child));
                }
                visited[child] = true;
                let oriented = if edge.start == node {
                    edge.clone()
                } else {
                    edge.clone().flipped()
                };
                children.push(oriented);
            }
            // Reverse so the smallest child is expanded first.
            for edge in children.into_iter().rev() {
                stack.push(edge.stop);
                ordered.push(edge);
            }
        }
        if let Some(missing) = (1..=size).find(|&local| !visited[local]) {
            return Err(invalid_tree("tree is disconnected").with_context("local", missing));
        }

        Ok(Self {
            size,
            root,
            edges: ordered,
        })
    }

    /// Number of nodes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Returns `true` for the tree of an emptied model.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Root node, `0` for an empty tree.
    pub fn root(&self) -> LocalPosition {
        self.root
    }

    /// Edges oriented away from the root.
    pub fn edges(&self) -> &[Edge] {
        &self.edges
    }

    /// Jump edges.
    pub fn jumps(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|edge| edge.is_jump())
    }

    /// Bond edges.
    pub fn bonds(&self) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(|edge| !edge.is_jump())
    }

    /// Number of jump edges.
    pub fn num_jumps(&self) -> usize {
        self.jumps().count()
    }

    /// Edge leading into `local`, `None` for the root.
    pub fn parent_of(&self, local: LocalPosition) -> Option<&Edge> {
        self.edges.iter().find(|edge| edge.stop == local)
    }

    /// Nodes connected to `local` by any edge, ascending.
    pub fn neighbours(&self, local: LocalPosition) -> Vec<LocalPosition> {
        let mut out: Vec<_> = self
            .edges
            .iter()
            .filter_map(|edge| edge.other(local))
            .collect();
        out.sort_unstable();
        out
    }

    /// Returns `true` if a bond joins `a` and `b`.
    pub fn has_bond(&self, a: LocalPosition, b: LocalPosition) -> bool {
        self.bonds().any(|edge| edge.other(a) == Some(b))
    }

    /// Returns `true` if `local` and `local + 1` are not joined by a bond.
    pub fn is_cutpoint(&self, local: LocalPosition) -> bool {
        local >= 1 && local < self.size && !self.has_bond(local, local + 1)
    }

    /// Returns `true` if `local` has at most one incident edge.
    pub fn is_leaf(&self, local: LocalPosition) -> bool {
        local >= 1 && local <= self.size && self.neighbours(local).len() <= 1
    }

    /// Returns `true` if `local` ends a bonded run or anchors a jump.
    pub fn possible_root(&self, local: LocalPosition) -> bool {
        if local == 0 || local > self.size {
            return false;
        }
        local == 1
            || local == self.size
            || self.is_cutpoint(local)
            || self.is_cutpoint(local - 1)
            || self.jumps().any(|edge| edge.touches(local))
    }

    /// Same tree rooted at `root`.
    pub fn reorder(&self, root: LocalPosition) -> Result<FoldTree, FoldError> {
        FoldTree::from_edges(self.size, root, self.edges.clone())
    }

    /// Relabels nodes; `mapping[i]` is the new label of local `i + 1`.
    pub fn renumber(&self, mapping: &[LocalPosition]) -> Result<FoldTree, FoldError> {
        if mapping.len() != self.size {
            return Err(invalid_tree("mapping must cover every node")
                .with_context("size", self.size)
                .with_context("mapping", mapping.len()));
        }
        let relabel = |local: LocalPosition| mapping[local - 1];
        let edges = self
            .edges
            .iter()
            .map(|edge| Edge {
                start: relabel(edge.start),
                stop: relabel(edge.stop),
                ..edge.clone()
            })
            .collect();
        let root = if self.size == 0 { 0 } else { relabel(self.root) };
        FoldTree::from_edges(self.size, root, edges)
    }

    /// Re-runs the structural checks.
    pub fn validate(&self) -> Result<(), FoldError> {
        FoldTree::from_edges(self.size, self.root, self.edges.clone()).map(|_| ())
    }

    /// Checks the tree against the global positions it is built over.
    ///
    /// Every bond must join sequence-adjacent globals, and every
    /// sequence-adjacent pair not separated by a closed cut point must be
    /// bonded.
    pub fn check_bonds(
        &self,
        positions: &[Position],
        global: &GlobalSequenceModel,
    ) -> Result<(), FoldError> {
        if positions.len() != self.size {
            return Err(invalid_tree("tree size differs from model size")
                .with_context("size", self.size)
                .with_context("model", positions.len()));
        }
        for edge in self.bonds() {
            let (a, b) = (positions[edge.start - 1], positions[edge.stop - 1]);
            if !global.position_is_adjacent_in_sequence(a, b) {
                return Err(invalid_tree("bond joins non-adjacent positions")
                    .with_context("position", a)
                    .with_context("partner", b));
            }
        }
        for (idx, pair) in positions.windows(2).enumerate() {
            let (a, b) = (pair[0], pair[1]);
            if global.is_bonded_successor(a, b)
                && !global.is_closed_cutpoint(a)
                && !self.has_bond(idx + 1, idx + 2)
            {
                return Err(invalid_tree("sequence-adjacent positions lack a bond")
                    .with_context("position", a)
                    .with_context("partner", b));
            }
        }
        Ok(())
    }
}

pub(crate) fn invalid_tree(message: &str) -> FoldError {
    FoldError::Structure(ErrorInfo::new(codes::INVALID_TREE, message))
}
