use log::{debug, warn};
use serde::{Deserialize, Serialize};

use fold_core::errors::{codes, ErrorInfo, FoldError};
use fold_core::{GlobalSequenceModel, LocalPosition, Position, WorkingModelIndex};

use crate::tree::{Edge, FoldTree};

/// Knobs controlling tree derivation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TreeBuildOptions {
    /// Attachment label written on both ends of every jump.
    #[serde(default)]
    pub jump_attachment: Option<String>,
    /// Reject closed cut points whose partner position is absent. Off by
    /// default, since growing models routinely hold one side of a closed cut
    /// point before the other.
    #[serde(default)]
    pub strict_closed_cutpoints: bool,
}

/// Maximal run of locals joined by bonds in the derived tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// First local position of the run.
    pub first: LocalPosition,
    /// Last local position of the run.
    pub last: LocalPosition,
}

impl Segment {
    /// Returns `true` if `local` lies in the run.
    pub fn contains(&self, local: LocalPosition) -> bool {
        self.first <= local && local <= self.last
    }
}

/// Derives fold trees from working-model snapshots.
///
/// A closed cut point at the last sequence position is always
/// `invalid-cutpoint`. A closed cut point whose partner (`pos + 1`) is absent
/// from the model is tolerated and simply ends its segment, unless
/// [`TreeBuildOptions::strict_closed_cutpoints`] is set, in which case it is
/// also `invalid-cutpoint`.
#[derive(Debug, Clone)]
pub struct FoldTreeBuilder<'a> {
    global: &'a GlobalSequenceModel,
    options: TreeBuildOptions,
}

impl<'a> FoldTreeBuilder<'a> {
    /// Creates a builder over the shared annotations.
    pub fn new(global: &'a GlobalSequenceModel, options: TreeBuildOptions) -> Self {
        Self { global, options }
    }

    /// Builds the tree for `index`, honouring its recorded jump hints.
    pub fn build(&self, index: &WorkingModelIndex) -> Result<FoldTree, FoldError> {
        self.build_from(index.positions(), index.jump_hints())
            .map_err(|err| err.with_context("model", index.owner()))
    }

    /// Builds the tree for a raw local-to-global list.
    pub fn build_from(
        &self,
        positions: &[Position],
        hints: &[(Position, Position)],
    ) -> Result<FoldTree, FoldError> {
        if positions.is_empty() {
            return Ok(FoldTree::empty());
        }
        let segments = self.segments(positions)?;
        let mut seg_of = vec![0usize; positions.len() + 1];
        for (idx, segment) in segments.iter().enumerate() {
            for local in segment.first..=segment.last {
                seg_of[local] = idx;
            }
        }
        let local_of = |pos: Position| positions.iter().position(|&g| g == pos).map(|i| i + 1);

        let mut edges: Vec<Edge> = Vec::with_capacity(positions.len() - 1);
        for segment in &segments {
            for local in segment.first..segment.last {
                edges.push(Edge::bond(local, local + 1));
            }
        }

        // Candidates in priority order: requested pairs, recorded hints, fixed
        // run ends, then any run ends.
        let mut candidates: Vec<(LocalPosition, LocalPosition)> = Vec::new();
        for &(a, b) in self.global.requested_jump_pairs() {
            if let (Some(la), Some(lb)) = (local_of(a), local_of(b)) {
                if seg_of[la] == seg_of[lb] {
                    warn!("requested jump {a}-{b} lies inside one bonded run; ignored");
                    continue;
                }
                candidates.push((la, lb));
            }
        }
        for &(a, b) in hints {
            if let (Some(la), Some(lb)) = (local_of(a), local_of(b)) {
                candidates.push((la, lb));
            }
        }
        let fixed = |local: &LocalPosition| !self.global.is_moveable(positions[local - 1]);
        for (i, earlier) in segments.iter().enumerate() {
            for later in &segments[i + 1..] {
                let from = (earlier.first..=earlier.last).rev().find(fixed);
                let to = (later.first..=later.last).find(fixed);
                if let (Some(from), Some(to)) = (from, to) {
                    candidates.push((from, to));
                }
            }
        }
        for (i, earlier) in segments.iter().enumerate() {
            for later in &segments[i + 1..] {
                candidates.push((earlier.last, later.first));
            }
        }

        let needed = segments.len() - 1;
        let mut components = DisjointSets::new(segments.len());
        let mut jumps: Vec<(LocalPosition, LocalPosition)> = Vec::with_capacity(needed);
        for (a, b) in candidates {
            if jumps.len() == needed {
                break;
            }
            if components.union(seg_of[a], seg_of[b]) {
                jumps.push((a, b));
            }
        }

        if jumps.len() < needed {
            return Err(FoldError::Structure(
                ErrorInfo::new(
                    codes::AMBIGUOUS_JUMP_ASSIGNMENT,
                    "greedy jump assignment left segments disconnected",
                )
                .with_context("segments", segments.len())
                .with_context("jumps", jumps.len()),
            ));
        }
        let label = self.options.jump_attachment.clone();
        for (a, b) in jumps {
            edges.push(Edge::jump(a, b).with_attachments(label.clone(), label.clone()));
        }

        let tree = FoldTree::from_edges(positions.len(), 1, edges)?;
        let root = self.choose_root(&tree, positions);
        if root == 1 {
            return Ok(tree);
        }
        debug!("rerooting tree at local {root} (global {})", positions[root - 1]);
        tree.reorder(root)
    }

    /// Splits `positions` into bonded runs, cutting at chain breaks and at
    /// closed cut points.
    pub fn segments(&self, positions: &[Position]) -> Result<Vec<Segment>, FoldError> {
        self.check_closed_cutpoints(positions)?;
        let mut segments = Vec::new();
        let mut first = 1;
        for local in 1..=positions.len() {
            let pos = positions[local - 1];
            let continues = positions.get(local).is_some_and(|&next| {
                self.global.is_bonded_successor(pos, next) && !self.global.is_closed_cutpoint(pos)
            });
            if !continues {
                segments.push(Segment { first, last: local });
                first = local + 1;
            }
        }
        Ok(segments)
    }

    fn check_closed_cutpoints(&self, positions: &[Position]) -> Result<(), FoldError> {
        for &pos in positions {
            if !self.global.is_closed_cutpoint(pos) {
                continue;
            }
            if pos == self.global.len() {
                return Err(FoldError::Structure(
                    ErrorInfo::new(codes::INVALID_CUTPOINT, "closed cut point at sequence end")
                        .with_context("position", pos),
                ));
            }
            if self.options.strict_closed_cutpoints && !positions.contains(&(pos + 1)) {
                return Err(FoldError::Structure(
                    ErrorInfo::new(
                        codes::INVALID_CUTPOINT,
                        "closed cut point partner is absent from the model",
                    )
                    .with_context("position", pos)
                    .with_context("partner", pos + 1),
                ));
            }
        }
        Ok(())
    }

    fn choose_root(&self, tree: &FoldTree, positions: &[Position]) -> LocalPosition {
        for &pos in self.global.requested_roots() {
            let Some(local) = positions.iter().position(|&g| g == pos).map(|i| i + 1) else {
                continue;
            };
            if tree.possible_root(local) {
                return local;
            }
            warn!("requested root {pos} is interior to a bonded run; ignored");
        }
        1
    }
}

struct DisjointSets {
    parent: Vec<usize>,
}

impl DisjointSets {
    fn new(len: usize) -> Self {
        Self {
            parent: (0..len).collect(),
        }
    }

    fn find(&mut self, mut item: usize) -> usize {
        while self.parent[item] != item {
            self.parent[item] = self.parent[self.parent[item]];
            item = self.parent[item];
        }
        item
    }

    /// Joins the sets of `a` and `b`; `false` if they were already joined.
    fn union(&mut self, a: usize, b: usize) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        let (low, high) = (ra.min(rb), ra.max(rb));
        self.parent[high] = low;
        true
    }
}
