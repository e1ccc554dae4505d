//! Terminus add/delete proposals.

use fold_core::errors::FoldError;
use fold_core::{GlobalSequenceModel, ModelRef, Position, RngHandle, WorkingModelIndex};

use crate::config::{MovePolicy, ProposalConfig};
use crate::engine::AssemblyEngine;
use crate::moves::AssemblyMove;

/// Enumerates and draws moves at the chain termini of a working model.
#[derive(Debug, Clone, Default)]
pub struct MoveProposer {
    config: ProposalConfig,
}

impl MoveProposer {
    /// Creates a proposer with the given settings.
    pub fn new(config: ProposalConfig) -> Self {
        Self { config }
    }

    /// Proposal settings in effect.
    pub fn config(&self) -> &ProposalConfig {
        &self.config
    }

    /// Every terminus move currently available to `model`, in a stable order.
    ///
    /// Adds come first, walking termini in local order; deletions follow.
    /// A position owned by a sibling shows up as an ordinary add, which the
    /// engine turns into a splice.
    pub fn candidates(
        &self,
        engine: &AssemblyEngine,
        model: ModelRef,
    ) -> Result<Vec<AssemblyMove>, FoldError> {
        let index = engine.index(model)?;
        let global = engine.global();
        let mut moves = Vec::new();
        for local in 1..=index.len() {
            let Some(pos) = index.to_global(local) else {
                continue;
            };
            if index.is_chain_end(local, global) {
                self.extend(index, global, pos, pos.checked_add(1), pos.checked_add(2), &mut moves);
            }
            if index.is_chain_start(local, global) {
                self.extend(index, global, pos, pos.checked_sub(1), pos.checked_sub(2), &mut moves);
            }
        }

        if !self.config.skip_deletions && !(self.config.disallow_delete_last && index.len() == 1) {
            for local in 1..=index.len() {
                let Some(pos) = index.to_global(local) else {
                    continue;
                };
                let terminal = index.is_chain_start(local, global) || index.is_chain_end(local, global);
                if terminal && deletable(global, engine.policy(), pos) {
                    push_unique(&mut moves, AssemblyMove::Delete { position: pos });
                }
            }
        }
        Ok(moves)
    }

    /// Draws one candidate uniformly; `None` when nothing is available.
    pub fn propose(
        &self,
        engine: &AssemblyEngine,
        model: ModelRef,
        rng: &mut RngHandle,
    ) -> Result<Option<AssemblyMove>, FoldError> {
        let moves = self.candidates(engine, model)?;
        Ok(rng.choose_index(moves.len()).map(|idx| moves[idx]))
    }

    fn extend(
        &self,
        index: &WorkingModelIndex,
        global: &GlobalSequenceModel,
        pos: Position,
        next: Option<Position>,
        skip: Option<Position>,
        moves: &mut Vec<AssemblyMove>,
    ) {
        let Some(next) = next else {
            return;
        };
        if !global.position_is_adjacent_in_sequence(pos, next) || index.contains(next) {
            return;
        }
        push_unique(
            moves,
            AssemblyMove::Add {
                position: next,
                attach_to: pos,
            },
        );
        if self.config.disallow_skip_bulge {
            return;
        }
        let Some(skip) = skip else {
            return;
        };
        if !global.position_is_adjacent_in_sequence(next, skip) || index.contains(skip) {
            return;
        }
        let beyond = if skip > next { skip.checked_add(1) } else { skip.checked_sub(1) };
        let crowded = beyond
            .is_some_and(|far| global.position_is_adjacent_in_sequence(skip, far) && index.contains(far));
        if !crowded {
            push_unique(
                moves,
                AssemblyMove::Add {
                    position: skip,
                    attach_to: pos,
                },
            );
        }
    }
}

fn deletable(global: &GlobalSequenceModel, policy: &MovePolicy, pos: Position) -> bool {
    global.is_moveable(pos) && (!policy.protect_fixed_domains || global.domain_of(pos).is_free())
}

fn push_unique(moves: &mut Vec<AssemblyMove>, mv: AssemblyMove) {
    if !moves.contains(&mv) {
        moves.push(mv);
    }
}
