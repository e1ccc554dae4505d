//! Process-wide description of the full target sequence and its annotations.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::{codes, ErrorInfo, FoldError};
use crate::ids::{DomainId, Position};

/// Raw annotation lists used to construct a [`GlobalSequenceModel`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceAnnotations {
    /// Full target sequence, one character per position.
    pub sequence: String,
    /// Positions after which the chain is not covalently continuous.
    #[serde(default)]
    pub open_cutpoints: Vec<Position>,
    /// Positions after which a loop-closure bond crosses a tree cut.
    #[serde(default)]
    pub closed_cutpoints: Vec<Position>,
    /// Extra positions allowed to move during minimization.
    #[serde(default)]
    pub extra_minimize: Vec<Position>,
    /// Positions eligible for resampling.
    #[serde(default)]
    pub sample_positions: Vec<Position>,
    /// User requested jump partners.
    #[serde(default)]
    pub jump_pairs: Vec<(Position, Position)>,
    /// User requested tree roots.
    #[serde(default)]
    pub roots: Vec<Position>,
}

/// Single source of truth for global numbering and structural annotations.
///
/// Annotation sets only ever grow. Positions are 1-based.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalSequenceModel {
    sequence: String,
    open_cutpoints: BTreeSet<Position>,
    closed_cutpoints: BTreeSet<Position>,
    fixed_domain: Vec<DomainId>,
    requested_jump_pairs: BTreeSet<(Position, Position)>,
    requested_roots: BTreeSet<Position>,
    extra_minimize: BTreeSet<Position>,
    sample_positions: BTreeSet<Position>,
}

impl GlobalSequenceModel {
    /// Creates an unannotated model over the provided sequence.
    pub fn new(sequence: impl Into<String>) -> Self {
        let sequence = sequence.into();
        let length = sequence.chars().count();
        Self {
            sequence,
            open_cutpoints: BTreeSet::new(),
            closed_cutpoints: BTreeSet::new(),
            fixed_domain: vec![DomainId::FREE; length],
            requested_jump_pairs: BTreeSet::new(),
            requested_roots: BTreeSet::new(),
            extra_minimize: BTreeSet::new(),
            sample_positions: BTreeSet::new(),
        }
    }

    /// Creates a model over a placeholder sequence of `length` positions.
    pub fn with_length(length: usize) -> Self {
        Self::new("n".repeat(length))
    }

    /// Builds a fully annotated model, validating every annotation.
    pub fn from_annotations(annotations: &SequenceAnnotations) -> Result<Self, FoldError> {
        let mut model = Self::new(annotations.sequence.clone());
        for &pos in &annotations.open_cutpoints {
            model.add_open_cutpoint(pos)?;
        }
        for &pos in &annotations.closed_cutpoints {
            model.add_closed_cutpoint(pos)?;
        }
        for &pos in &annotations.extra_minimize {
            model.add_extra_minimize(pos)?;
        }
        for &pos in &annotations.sample_positions {
            model.add_sample_position(pos)?;
        }
        for &(a, b) in &annotations.jump_pairs {
            model.register_requested_jump(a, b)?;
        }
        for &pos in &annotations.roots {
            model.register_requested_root(pos)?;
        }
        Ok(model)
    }

    /// Total number of addressable positions (N).
    pub fn len(&self) -> usize {
        self.fixed_domain.len()
    }

    /// Returns `true` for an empty target sequence.
    pub fn is_empty(&self) -> bool {
        self.fixed_domain.is_empty()
    }

    /// Returns the full target sequence.
    pub fn sequence(&self) -> &str {
        &self.sequence
    }

    /// Returns the sequence character at `pos`.
    pub fn residue_at(&self, pos: Position) -> Option<char> {
        if pos == 0 {
            return None;
        }
        self.sequence.chars().nth(pos - 1)
    }

    /// Returns `true` when `pos` lies in `1..=N`.
    pub fn in_range(&self, pos: Position) -> bool {
        pos >= 1 && pos <= self.len()
    }

    /// Fails with `position-out-of-range` unless `pos` lies in `1..=N`.
    pub fn check_position(&self, pos: Position) -> Result<(), FoldError> {
        if self.in_range(pos) {
            Ok(())
        } else {
            Err(FoldError::Annotation(
                ErrorInfo::new(codes::POSITION_OUT_OF_RANGE, "position outside target sequence")
                    .with_context("position", pos)
                    .with_context("length", self.len()),
            ))
        }
    }

    /// `|a-b| == 1`, both in range, and no open cut point between them.
    pub fn position_is_adjacent_in_sequence(&self, a: Position, b: Position) -> bool {
        if !self.in_range(a) || !self.in_range(b) || a.abs_diff(b) != 1 {
            return false;
        }
        !self.open_cutpoints.contains(&a.min(b))
    }

    /// Directional adjacency: `b` immediately follows `a` along a chain.
    pub fn is_bonded_successor(&self, a: Position, b: Position) -> bool {
        b == a + 1 && self.position_is_adjacent_in_sequence(a, b)
    }

    /// 1-based chain index of `pos`; a new chain starts after every open cut point.
    pub fn chain_of(&self, pos: Position) -> usize {
        1 + self.open_cutpoints.range(..pos).count()
    }

    /// Returns `true` if `pos` is an open cut point.
    pub fn is_open_cutpoint(&self, pos: Position) -> bool {
        self.open_cutpoints.contains(&pos)
    }

    /// Returns `true` if `pos` is a closed cut point.
    pub fn is_closed_cutpoint(&self, pos: Position) -> bool {
        self.closed_cutpoints.contains(&pos)
    }

    /// Open cut points in ascending order.
    pub fn open_cutpoints(&self) -> &BTreeSet<Position> {
        &self.open_cutpoints
    }

    /// Closed cut points in ascending order.
    pub fn closed_cutpoints(&self) -> &BTreeSet<Position> {
        &self.closed_cutpoints
    }

    /// Requested jump pairs, normalised to `(low, high)`.
    pub fn requested_jump_pairs(&self) -> &BTreeSet<(Position, Position)> {
        &self.requested_jump_pairs
    }

    /// Requested roots in ascending order.
    pub fn requested_roots(&self) -> &BTreeSet<Position> {
        &self.requested_roots
    }

    /// Domain label of `pos` (`FREE` for out-of-range positions).
    pub fn domain_of(&self, pos: Position) -> DomainId {
        if !self.in_range(pos) {
            return DomainId::FREE;
        }
        self.fixed_domain[pos - 1]
    }

    /// Returns `true` if `pos` may move during sampling or minimization.
    pub fn is_moveable(&self, pos: Position) -> bool {
        self.sample_positions.contains(&pos) || self.extra_minimize.contains(&pos)
    }

    /// Returns `true` if `pos` is eligible for resampling.
    pub fn is_sample_position(&self, pos: Position) -> bool {
        self.sample_positions.contains(&pos)
    }

    /// Declares an open cut point after `pos`.
    pub fn add_open_cutpoint(&mut self, pos: Position) -> Result<(), FoldError> {
        self.check_position(pos)?;
        if self.closed_cutpoints.contains(&pos) {
            return Err(cutpoint_conflict(pos, "closed"));
        }
        self.open_cutpoints.insert(pos);
        Ok(())
    }

    /// Declares a closed (loop-closure) cut point after `pos`.
    pub fn add_closed_cutpoint(&mut self, pos: Position) -> Result<(), FoldError> {
        self.check_position(pos)?;
        if self.open_cutpoints.contains(&pos) {
            return Err(cutpoint_conflict(pos, "open"));
        }
        self.closed_cutpoints.insert(pos);
        Ok(())
    }

    /// Flags `pos` as an extra minimizable position.
    pub fn add_extra_minimize(&mut self, pos: Position) -> Result<(), FoldError> {
        self.check_position(pos)?;
        self.extra_minimize.insert(pos);
        Ok(())
    }

    /// Flags `pos` as eligible for resampling.
    pub fn add_sample_position(&mut self, pos: Position) -> Result<(), FoldError> {
        self.check_position(pos)?;
        self.sample_positions.insert(pos);
        Ok(())
    }

    /// Associates every position with `domain`.
    ///
    /// Fails without mutating anything if a position already belongs to a
    /// different nonzero domain.
    pub fn mark_domain(
        &mut self,
        positions: &[Position],
        domain: DomainId,
    ) -> Result<(), FoldError> {
        for &pos in positions {
            self.check_position(pos)?;
            let current = self.fixed_domain[pos - 1];
            if !current.is_free() && current != domain {
                return Err(FoldError::Annotation(
                    ErrorInfo::new(
                        codes::DOMAIN_CONFLICT,
                        "position already belongs to another fixed domain",
                    )
                    .with_context("position", pos)
                    .with_context("existing", current.as_raw())
                    .with_context("requested", domain.as_raw()),
                ));
            }
        }
        for &pos in positions {
            self.fixed_domain[pos - 1] = domain;
        }
        Ok(())
    }

    /// Records a user requested jump between `a` and `b`.
    pub fn register_requested_jump(&mut self, a: Position, b: Position) -> Result<(), FoldError> {
        self.check_position(a)?;
        self.check_position(b)?;
        if a == b {
            return Err(FoldError::Annotation(
                ErrorInfo::new(codes::POSITION_OUT_OF_RANGE, "jump partners must differ")
                    .with_context("position", a),
            ));
        }
        self.requested_jump_pairs.insert((a.min(b), a.max(b)));
        Ok(())
    }

    /// Records a user requested tree root.
    pub fn register_requested_root(&mut self, pos: Position) -> Result<(), FoldError> {
        self.check_position(pos)?;
        self.requested_roots.insert(pos);
        Ok(())
    }
}

fn cutpoint_conflict(pos: Position, existing: &str) -> FoldError {
    FoldError::Annotation(
        ErrorInfo::new(
            codes::CUTPOINT_CONFLICT,
            "position cannot be both an open and a closed cut point",
        )
        .with_context("position", pos)
        .with_context("existing", existing),
    )
}
