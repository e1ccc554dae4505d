//! Propose/apply/accept loop over one working model.

use fold_core::errors::FoldError;
use fold_core::{cycle_seed, ModelRef, RngHandle};
use fold_tree::canonical_hash;
use indexmap::IndexMap;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::engine::AssemblyEngine;
use crate::moves::MoveOutcome;
use crate::propose::MoveProposer;

/// Decides whether an applied move is kept.
///
/// Scoring lives outside this crate; implementations inspect the engine
/// after the move has been applied.
pub trait AcceptanceCriterion {
    /// Returns `true` to keep the move, `false` to roll it back.
    fn accept(&mut self, engine: &AssemblyEngine, model: ModelRef, outcome: &MoveOutcome) -> bool;
}

/// Keeps every move that applies cleanly.
#[derive(Debug, Clone, Copy, Default)]
pub struct AcceptAll;

impl AcceptanceCriterion for AcceptAll {
    fn accept(&mut self, _engine: &AssemblyEngine, _model: ModelRef, _outcome: &MoveOutcome) -> bool {
        true
    }
}

/// Tallies gathered by [`run_cycles`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SamplingSummary {
    /// Cycles executed.
    pub cycles: usize,
    /// Proposals per move label.
    pub proposed: IndexMap<String, usize>,
    /// Accepted moves per move label.
    pub accepted: IndexMap<String, usize>,
    /// Proposals the engine refused.
    pub rejected: usize,
    /// Cycles in which the proposer had nothing to offer.
    pub no_move_cycles: usize,
    /// Canonical hash of the model's final tree, if it is still live.
    pub final_tree_hash: Option<String>,
    /// Element count of the model at the end of the run.
    pub final_size: usize,
    /// `true` if the model left the live set during the run.
    pub model_discarded: bool,
}

impl SamplingSummary {
    /// Accepted over proposed for `label`, `0.0` when never proposed.
    pub fn acceptance_rate(&self, label: &str) -> f64 {
        match self.proposed.get(label) {
            Some(&proposed) if proposed > 0 => {
                self.accepted.get(label).copied().unwrap_or(0) as f64 / proposed as f64
            }
            _ => 0.0,
        }
    }
}

/// Runs `cycles` propose/apply/accept rounds on `model`.
///
/// Each cycle draws from its own substream of `seed`, so runs are
/// reproducible. Rejected or refused moves leave the engine exactly as it
/// was; errors other than rejections abort the run.
pub fn run_cycles(
    engine: &mut AssemblyEngine,
    model: ModelRef,
    proposer: &MoveProposer,
    criterion: &mut dyn AcceptanceCriterion,
    cycles: usize,
    seed: u64,
) -> Result<SamplingSummary, FoldError> {
    let mut summary = SamplingSummary::default();
    for cycle in 0..cycles {
        summary.cycles += 1;
        let mut rng = RngHandle::from_seed(cycle_seed(seed, model, cycle as u64));
        let Some(mv) = proposer.propose(engine, model, &mut rng)? else {
            summary.no_move_cycles += 1;
            continue;
        };
        *summary.proposed.entry(mv.label().to_string()).or_insert(0) += 1;

        let snapshot = engine.clone();
        let outcome = match engine.apply(model, &mv) {
            Ok(outcome) => outcome,
            Err(err) if err.is_rejection() => {
                summary.rejected += 1;
                continue;
            }
            Err(err) => return Err(err.with_context("cycle", cycle)),
        };
        if !outcome.applied {
            continue;
        }
        if criterion.accept(engine, model, &outcome) {
            *summary.accepted.entry(mv.label().to_string()).or_insert(0) += 1;
        } else {
            *engine = snapshot;
            continue;
        }
        if outcome.discarded {
            summary.model_discarded = true;
            debug!("model {model} discarded at cycle {cycle}; stopping");
            break;
        }
    }

    if let Ok(index) = engine.index(model) {
        summary.final_size = index.len();
    }
    if let Ok(tree) = engine.tree(model) {
        summary.final_tree_hash = Some(canonical_hash(tree));
    }
    debug!(
        "sampled model {model} for {} cycles: {} rejected, {} idle",
        summary.cycles, summary.rejected, summary.no_move_cycles
    );
    Ok(summary)
}
