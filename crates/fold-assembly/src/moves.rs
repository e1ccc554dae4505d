use fold_core::{GlobalSequenceModel, LocalPosition, ModelRef, Position};
use serde::{Deserialize, Serialize};

/// How a spliced-in sibling is joined to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum Junction {
    /// The models share a sequence-adjacent pair.
    Bond,
    /// The models share no sequence-adjacent pair; the builder picks the jump.
    Jump,
    /// Jump anchored between `from` and `to`, one in each model.
    JumpAt {
        /// Anchor on one side.
        from: Position,
        /// Anchor on the other side.
        to: Position,
    },
}

/// Structural edit executed by [`AssemblyEngine::apply`](crate::AssemblyEngine::apply).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum AssemblyMove {
    /// Instantiate `position`, attached to the present `attach_to`.
    Add {
        /// Global position to instantiate.
        position: Position,
        /// Global position it attaches to.
        attach_to: Position,
    },
    /// Remove `position` from the model.
    Delete {
        /// Global position to remove.
        position: Position,
    },
    /// Merge a live sibling into the model.
    SpliceIn {
        /// Sibling to absorb.
        sibling: ModelRef,
        /// Connection between the two.
        junction: Junction,
    },
    /// Split a previously absorbed sibling back out.
    SpliceOut {
        /// Handle the sibling had before it was absorbed.
        sibling: ModelRef,
    },
}

impl AssemblyMove {
    /// Short label used for tallies and logs.
    pub fn label(&self) -> &'static str {
        match self {
            AssemblyMove::Add { .. } => "add",
            AssemblyMove::Delete { .. } => "delete",
            AssemblyMove::SpliceIn { .. } => "splice-in",
            AssemblyMove::SpliceOut { .. } => "splice-out",
        }
    }
}

/// Attachment classification of an add.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttachmentKind {
    /// Bonded to the preceding position.
    BondPrevious,
    /// Bonded to the following position.
    BondNext,
    /// Jump to a position on the same chain.
    JumpWithinChain,
    /// Jump to a position on another chain.
    JumpAcrossChain,
}

impl AttachmentKind {
    /// Classifies attaching `position` to `attach_to`.
    pub fn classify(global: &GlobalSequenceModel, position: Position, attach_to: Position) -> Self {
        if global.position_is_adjacent_in_sequence(position, attach_to) {
            if position > attach_to {
                AttachmentKind::BondPrevious
            } else {
                AttachmentKind::BondNext
            }
        } else if global.chain_of(position) == global.chain_of(attach_to) {
            AttachmentKind::JumpWithinChain
        } else {
            AttachmentKind::JumpAcrossChain
        }
    }

    /// Returns `true` for bonded attachments.
    pub fn is_bond(&self) -> bool {
        matches!(self, AttachmentKind::BondPrevious | AttachmentKind::BondNext)
    }
}

/// Result of a move that did not fail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    /// `false` for a tolerated no-op.
    pub applied: bool,
    /// Model the move was applied to.
    pub model: ModelRef,
    /// Attachment classification for adds.
    pub attachment: Option<AttachmentKind>,
    /// Local positions created or vacated by the move.
    pub touched: Vec<LocalPosition>,
    /// `true` when the tree was rebuilt rather than patched.
    pub rebuilt: bool,
    /// `true` when the model left the live set.
    pub discarded: bool,
}

impl MoveOutcome {
    pub(crate) fn new(model: ModelRef) -> Self {
        Self {
            applied: true,
            model,
            attachment: None,
            touched: Vec::new(),
            rebuilt: false,
            discarded: false,
        }
    }
}
