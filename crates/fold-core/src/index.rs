//! Per-model translation between local ordering and global numbering.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::ops::RangeInclusive;

use serde::{Deserialize, Serialize};

use crate::errors::{codes, ErrorInfo, FoldError};
use crate::ids::{LocalPosition, ModelRef, Position};
use crate::sequence::GlobalSequenceModel;

/// Where [`WorkingModelIndex::absorb`] places the incoming elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InsertionPoint {
    /// Merge both lists by global position.
    Sorted,
    /// Insert the sibling's list as one block starting at this local position.
    At(LocalPosition),
}

/// Renumbering produced by [`WorkingModelIndex::absorb`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AbsorbReport {
    /// New local positions of the absorbed elements, in the sibling's order.
    pub absorbed_locals: Vec<LocalPosition>,
    /// `host_renumbered[i]` is the new local position of old local `i + 1`.
    pub host_renumbered: Vec<LocalPosition>,
}

/// Ordered list of global positions currently instantiated by one model.
///
/// Whenever `g` and `g + 1` are both present and sequence-adjacent, `g + 1`
/// sits immediately after `g`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingModelIndex {
    owner: ModelRef,
    local_to_global: Vec<Position>,
    siblings: BTreeSet<ModelRef>,
    #[serde(default)]
    jump_hints: Vec<(Position, Position)>,
    #[serde(default)]
    absorbed: BTreeMap<ModelRef, BTreeSet<Position>>,
}

impl WorkingModelIndex {
    /// Creates an index from a non-empty seed list.
    pub fn new(
        owner: ModelRef,
        seed: Vec<Position>,
        global: &GlobalSequenceModel,
    ) -> Result<Self, FoldError> {
        if seed.is_empty() {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::WOULD_EMPTY_MODEL, "seed list must not be empty")
                    .with_context("model", owner),
            ));
        }
        for &pos in &seed {
            global.check_position(pos)?;
        }
        check_adjacency_order(&seed, global)?;
        Ok(Self {
            owner,
            local_to_global: seed,
            siblings: BTreeSet::new(),
            jump_hints: Vec::new(),
            absorbed: BTreeMap::new(),
        })
    }

    /// Handle of the model this index belongs to.
    pub fn owner(&self) -> ModelRef {
        self.owner
    }

    /// Number of instantiated elements.
    pub fn len(&self) -> usize {
        self.local_to_global.len()
    }

    /// Returns `true` when no element is instantiated.
    pub fn is_empty(&self) -> bool {
        self.local_to_global.is_empty()
    }

    /// Global positions in local order.
    pub fn positions(&self) -> &[Position] {
        &self.local_to_global
    }

    /// Other live models that jointly cover the remaining positions.
    pub fn siblings(&self) -> &BTreeSet<ModelRef> {
        &self.siblings
    }

    /// Jump anchors recorded by earlier jump attachments.
    pub fn jump_hints(&self) -> &[(Position, Position)] {
        &self.jump_hints
    }

    /// Positions contributed by each spliced-in sibling that are still present.
    pub fn absorbed(&self) -> &BTreeMap<ModelRef, BTreeSet<Position>> {
        &self.absorbed
    }

    /// Returns `true` if `pos` is instantiated by this model.
    pub fn contains(&self, pos: Position) -> bool {
        self.local_to_global.contains(&pos)
    }

    /// Local position of `pos`.
    pub fn to_local(&self, pos: Position) -> Result<LocalPosition, FoldError> {
        self.local_to_global
            .iter()
            .position(|&g| g == pos)
            .map(|idx| idx + 1)
            .ok_or_else(|| {
                FoldError::Rejected(
                    ErrorInfo::new(codes::NOT_PRESENT, "position is not instantiated by model")
                        .with_context("position", pos)
                        .with_context("model", self.owner),
                )
            })
    }

    /// Global position at `local`, if `local` is in `1..=len`.
    pub fn to_global(&self, local: LocalPosition) -> Option<Position> {
        if local == 0 {
            return None;
        }
        self.local_to_global.get(local - 1).copied()
    }

    /// Returns `true` if the element at `local` has no bonded predecessor in this model.
    pub fn is_chain_start(&self, local: LocalPosition, global: &GlobalSequenceModel) -> bool {
        match self.to_global(local) {
            Some(pos) => !(local > 1
                && self
                    .to_global(local - 1)
                    .is_some_and(|prev| global.is_bonded_successor(prev, pos))),
            None => false,
        }
    }

    /// Returns `true` if the element at `local` has no bonded successor in this model.
    pub fn is_chain_end(&self, local: LocalPosition, global: &GlobalSequenceModel) -> bool {
        match self.to_global(local) {
            Some(pos) => !self
                .to_global(local + 1)
                .is_some_and(|next| global.is_bonded_successor(pos, next)),
            None => false,
        }
    }

    /// Inserts `pos` right after `local` and returns its new local position.
    pub fn insert_after_local(
        &mut self,
        local: LocalPosition,
        pos: Position,
        global: &GlobalSequenceModel,
    ) -> Result<LocalPosition, FoldError> {
        self.check_local(local)?;
        self.insert_at(local + 1, pos, global)
    }

    /// Inserts `pos` right before `local` and returns its new local position.
    pub fn insert_before_local(
        &mut self,
        local: LocalPosition,
        pos: Position,
        global: &GlobalSequenceModel,
    ) -> Result<LocalPosition, FoldError> {
        self.check_local(local)?;
        self.insert_at(local, pos, global)
    }

    fn insert_at(
        &mut self,
        new_local: LocalPosition,
        pos: Position,
        global: &GlobalSequenceModel,
    ) -> Result<LocalPosition, FoldError> {
        global.check_position(pos)?;
        if self.contains(pos) {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "position already instantiated")
                    .with_context("position", pos)
                    .with_context("model", self.owner),
            ));
        }
        let mut trial = self.local_to_global.clone();
        trial.insert(new_local - 1, pos);
        check_adjacency_order(&trial, global)?;
        self.local_to_global = trial;
        Ok(new_local)
    }

    /// Removes the element at `local` and returns its global position.
    pub fn remove_local(
        &mut self,
        local: LocalPosition,
        allow_empty: bool,
    ) -> Result<Position, FoldError> {
        self.check_local(local)?;
        if self.len() == 1 && !allow_empty {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::WOULD_EMPTY_MODEL, "cannot remove last element of model")
                    .with_context("model", self.owner)
                    .with_context("position", self.local_to_global[0]),
            ));
        }
        let pos = self.local_to_global.remove(local - 1);
        self.prune_hints_for(pos);
        for positions in self.absorbed.values_mut() {
            positions.remove(&pos);
        }
        self.absorbed.retain(|_, positions| !positions.is_empty());
        Ok(pos)
    }

    /// Splices the full list of `sibling` into this index.
    ///
    /// The sibling handle leaves this model's sibling set and the sibling's
    /// own siblings are inherited. Nothing changes on error.
    pub fn absorb(
        &mut self,
        sibling: WorkingModelIndex,
        at: InsertionPoint,
        global: &GlobalSequenceModel,
    ) -> Result<AbsorbReport, FoldError> {
        if sibling.owner == self.owner {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model cannot absorb itself")
                    .with_context("model", self.owner),
            ));
        }
        if let Some(&shared) = sibling.positions().iter().find(|&&g| self.contains(g)) {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "models overlap")
                    .with_context("position", shared)
                    .with_context("model", self.owner)
                    .with_context("sibling", sibling.owner),
            ));
        }

        // Tag each element with its origin so the report can be rebuilt after merging.
        let host: Vec<(Position, Origin)> = self
            .local_to_global
            .iter()
            .enumerate()
            .map(|(idx, &g)| (g, Origin::Host(idx)))
            .collect();
        let incoming: Vec<(Position, Origin)> = sibling
            .local_to_global
            .iter()
            .enumerate()
            .map(|(idx, &g)| (g, Origin::Sibling(idx)))
            .collect();

        let merged = match at {
            InsertionPoint::Sorted => merge_by_position(host, incoming),
            InsertionPoint::At(local) => {
                if local == 0 || local > self.len() + 1 {
                    return Err(local_out_of_range(self.owner, local, self.len()));
                }
                let mut merged = host;
                let tail = merged.split_off(local - 1);
                merged.extend(incoming);
                merged.extend(tail);
                merged
            }
        };

        let trial: Vec<Position> = merged.iter().map(|(g, _)| *g).collect();
        check_adjacency_order(&trial, global)?;

        let mut absorbed_locals = vec![0; sibling.len()];
        let mut host_renumbered = vec![0; self.len()];
        for (idx, (_, origin)) in merged.iter().enumerate() {
            match origin {
                Origin::Host(old) => host_renumbered[*old] = idx + 1,
                Origin::Sibling(old) => absorbed_locals[*old] = idx + 1,
            }
        }

        let WorkingModelIndex {
            owner: sibling_owner,
            local_to_global: sibling_positions,
            siblings: sibling_siblings,
            jump_hints: sibling_hints,
            absorbed: sibling_absorbed,
        } = sibling;

        self.local_to_global = trial;
        self.siblings.remove(&sibling_owner);
        self.siblings.extend(
            sibling_siblings
                .into_iter()
                .filter(|model| *model != self.owner),
        );
        self.jump_hints.extend(sibling_hints);
        for (model, positions) in sibling_absorbed {
            self.absorbed.entry(model).or_default().extend(positions);
        }
        self.absorbed
            .entry(sibling_owner)
            .or_default()
            .extend(sibling_positions);

        Ok(AbsorbReport {
            absorbed_locals,
            host_renumbered,
        })
    }

    /// Extracts a contiguous local run into a new index owned by `new_owner`.
    ///
    /// The two indices become mutual siblings. Jump hints crossing the cut are
    /// dropped.
    pub fn split(
        &mut self,
        range: RangeInclusive<LocalPosition>,
        new_owner: ModelRef,
        allow_empty: bool,
    ) -> Result<WorkingModelIndex, FoldError> {
        let (first, last) = (*range.start(), *range.end());
        if first == 0 || first > last || last > self.len() {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "split range outside model")
                    .with_context("model", self.owner)
                    .with_context("first", first)
                    .with_context("last", last)
                    .with_context("size", self.len()),
            ));
        }
        if first == 1 && last == self.len() && !allow_empty {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::WOULD_EMPTY_MODEL, "split would empty the model")
                    .with_context("model", self.owner),
            ));
        }
        if new_owner == self.owner {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "split target must be a different model")
                    .with_context("model", self.owner),
            ));
        }

        let extracted: Vec<Position> = self.local_to_global.drain(first - 1..last).collect();
        let moved: BTreeSet<Position> = extracted.iter().copied().collect();

        let (kept_hints, moved_hints): (Vec<_>, Vec<_>) = self
            .jump_hints
            .drain(..)
            .filter(|(a, b)| moved.contains(a) == moved.contains(b))
            .partition(|(a, _)| !moved.contains(a));
        self.jump_hints = kept_hints;

        let mut moved_absorbed = BTreeMap::new();
        for (model, positions) in std::mem::take(&mut self.absorbed) {
            let (inside, outside): (BTreeSet<Position>, BTreeSet<Position>) =
                positions.into_iter().partition(|g| moved.contains(g));
            if !inside.is_empty() && model != new_owner {
                moved_absorbed.insert(model, inside);
            }
            if !outside.is_empty() {
                self.absorbed.insert(model, outside);
            }
        }

        let mut siblings = self.siblings.clone();
        siblings.insert(self.owner);
        siblings.remove(&new_owner);
        self.siblings.insert(new_owner);

        Ok(WorkingModelIndex {
            owner: new_owner,
            local_to_global: extracted,
            siblings,
            jump_hints: moved_hints,
            absorbed: moved_absorbed,
        })
    }

    /// Records a preferred jump anchor between two present positions.
    pub fn add_jump_hint(&mut self, from: Position, to: Position) {
        if !self.jump_hints.contains(&(from, to)) {
            self.jump_hints.push((from, to));
        }
    }

    /// Drops jump hints touching `pos`.
    pub fn prune_hints_for(&mut self, pos: Position) {
        self.jump_hints.retain(|(a, b)| *a != pos && *b != pos);
    }

    /// Re-checks range and ordering invariants.
    pub fn verify(&self, global: &GlobalSequenceModel) -> Result<(), FoldError> {
        for &pos in &self.local_to_global {
            global.check_position(pos)?;
        }
        check_adjacency_order(&self.local_to_global, global)
    }

    pub(crate) fn add_sibling(&mut self, model: ModelRef) {
        if model != self.owner {
            self.siblings.insert(model);
        }
    }

    pub(crate) fn remove_sibling(&mut self, model: ModelRef) {
        self.siblings.remove(&model);
    }

    fn check_local(&self, local: LocalPosition) -> Result<(), FoldError> {
        if local == 0 || local > self.len() {
            return Err(local_out_of_range(self.owner, local, self.len()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum Origin {
    Host(usize),
    Sibling(usize),
}

fn merge_by_position(
    host: Vec<(Position, Origin)>,
    incoming: Vec<(Position, Origin)>,
) -> Vec<(Position, Origin)> {
    let mut merged = Vec::with_capacity(host.len() + incoming.len());
    let mut left = host.into_iter().peekable();
    let mut right = incoming.into_iter().peekable();
    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some((a, _)), Some((b, _))) => a < b,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        if let Some(item) = next {
            merged.push(item);
        }
    }
    merged
}

fn local_out_of_range(owner: ModelRef, local: LocalPosition, size: usize) -> FoldError {
    FoldError::Rejected(
        ErrorInfo::new(codes::NOT_PRESENT, "local position outside model")
            .with_context("local", local)
            .with_context("size", size)
            .with_context("model", owner),
    )
}

/// Checks that positions are distinct and that every sequence-adjacent pair
/// present in the list occupies consecutive slots.
pub fn check_adjacency_order(
    positions: &[Position],
    global: &GlobalSequenceModel,
) -> Result<(), FoldError> {
    let mut slots: HashMap<Position, usize> = HashMap::with_capacity(positions.len());
    for (idx, &pos) in positions.iter().enumerate() {
        if slots.insert(pos, idx).is_some() {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "position listed twice")
                    .with_context("position", pos),
            ));
        }
    }
    for (idx, &pos) in positions.iter().enumerate() {
        if !global.is_bonded_successor(pos, pos + 1) {
            continue;
        }
        if let Some(&next) = slots.get(&(pos + 1)) {
            if next != idx + 1 {
                return Err(FoldError::Rejected(
                    ErrorInfo::new(
                        codes::OUT_OF_ORDER,
                        "sequence-adjacent positions must be locally adjacent",
                    )
                    .with_context("position", pos)
                    .with_context("successor", pos + 1)
                    .with_context("local", idx + 1)
                    .with_context("successor_local", next + 1),
                ));
            }
        }
    }
    Ok(())
}
