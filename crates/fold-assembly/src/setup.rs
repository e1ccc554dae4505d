//! Builds an engine from a [`RunConfiguration`].

use std::collections::BTreeMap;

use fold_core::errors::{codes, ErrorInfo, FoldError};
use fold_core::{DomainId, GlobalSequenceModel, Position};
use log::info;

use crate::config::RunConfiguration;
use crate::engine::AssemblyEngine;

/// Validates the configured models, finalises the annotations and registers
/// every seed model with a freshly built tree.
///
/// Chain breaks listed on a seed become open cut points. Positions of model
/// `n` (1-based) that are not sample positions are marked with fixed domain
/// `n`.
pub fn initialize(config: &RunConfiguration) -> Result<AssemblyEngine, FoldError> {
    let mut annotations = config.annotations();
    for (idx, seed) in config.models.iter().enumerate() {
        if seed.res_list.is_empty() {
            return Err(invalid_seed(idx, "model seed has no positions"));
        }
        for &brk in &seed.chain_breaks {
            if !seed.res_list.contains(&brk) {
                return Err(invalid_seed(idx, "chain break outside the model")
                    .with_context("position", brk));
            }
            if !annotations.open_cutpoints.contains(&brk) {
                info!("model {} breaks after {brk}; recording an open cut point", idx + 1);
                annotations.open_cutpoints.push(brk);
            }
        }
    }

    let mut global = GlobalSequenceModel::from_annotations(&annotations)?;
    let mut claimed: BTreeMap<Position, usize> = BTreeMap::new();
    for (idx, seed) in config.models.iter().enumerate() {
        for &pos in &seed.res_list {
            global.check_position(pos).map_err(|err| seed_error(idx, err))?;
            if let Some(other) = claimed.insert(pos, idx) {
                return Err(invalid_seed(idx, "model seeds overlap")
                    .with_context("position", pos)
                    .with_context("other", other + 1));
            }
        }
    }
    for (idx, seed) in config.models.iter().enumerate() {
        let fixed: Vec<_> = seed
            .res_list
            .iter()
            .copied()
            .filter(|&pos| !global.is_sample_position(pos))
            .collect();
        if fixed.is_empty() {
            continue;
        }
        let domain = DomainId::from_raw(idx as u32 + 1);
        global
            .mark_domain(&fixed, domain)
            .map_err(|err| seed_error(idx, err))?;
        info!("model {} fixes {} positions as domain {}", idx + 1, fixed.len(), domain.as_raw());
    }

    let mut engine = AssemblyEngine::new(global, config.policy.clone(), config.tree.clone());
    for (idx, seed) in config.models.iter().enumerate() {
        engine
            .add_model(seed.res_list.clone())
            .map_err(|err| seed_error(idx, err))?;
    }
    info!(
        "initialised {} models over {} positions",
        engine.live_models().len(),
        engine.global().len()
    );
    Ok(engine)
}

fn invalid_seed(idx: usize, message: &str) -> FoldError {
    FoldError::Config(ErrorInfo::new(codes::INVALID_MODEL_SEED, message).with_context("model", idx + 1))
}

fn seed_error(idx: usize, err: FoldError) -> FoldError {
    let cause = err.code().to_string();
    match cause.as_str() {
        codes::OWNERSHIP_CONFLICT | codes::POSITION_OUT_OF_RANGE | codes::OUT_OF_ORDER => {
            let mut info = err.info().clone();
            info.code = codes::INVALID_MODEL_SEED.to_string();
            FoldError::Config(info.with_context("model", idx + 1).with_context("cause", &cause))
        }
        _ => err.with_context("model", idx + 1),
    }
}
