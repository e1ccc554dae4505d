//! Arena of working models keyed by [`ModelRef`] handles.

use std::collections::{BTreeMap, BTreeSet};
use std::ops::RangeInclusive;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::errors::{codes, ErrorInfo, FoldError};
use crate::ids::{LocalPosition, ModelRef, Position};
use crate::index::{AbsorbReport, InsertionPoint, WorkingModelIndex};
use crate::sequence::GlobalSequenceModel;

/// Owns every live [`WorkingModelIndex`] and keeps sibling sets symmetric.
///
/// Vacated slots stay reserved so a model spliced in can later be revived
/// under its original handle.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRegistry {
    slots: Vec<Option<WorkingModelIndex>>,
}

impl ModelRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a new model over `seed` and links it with every live model.
    pub fn register(
        &mut self,
        seed: Vec<Position>,
        global: &GlobalSequenceModel,
    ) -> Result<ModelRef, FoldError> {
        let model = ModelRef::from_raw(self.slots.len() as u32);
        for &pos in &seed {
            if let Some(owner) = self.owner_of(pos) {
                return Err(ownership_conflict(pos, owner, model));
            }
        }
        let mut index = WorkingModelIndex::new(model, seed, global)?;
        for other in self.live_refs() {
            index.add_sibling(other);
        }
        for slot in self.slots.iter_mut().flatten() {
            slot.add_sibling(model);
        }
        debug!("registered model {model} with {} elements", index.len());
        self.slots.push(Some(index));
        Ok(model)
    }

    /// Number of live models.
    pub fn len(&self) -> usize {
        self.slots.iter().flatten().count()
    }

    /// Returns `true` when no model is live.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if `model` is live.
    pub fn contains(&self, model: ModelRef) -> bool {
        matches!(self.slots.get(model.slot()), Some(Some(_)))
    }

    /// Handles of every live model in ascending order.
    pub fn live_refs(&self) -> Vec<ModelRef> {
        self.slots.iter().flatten().map(|index| index.owner()).collect()
    }

    /// Returns the index of a live model.
    pub fn get(&self, model: ModelRef) -> Result<&WorkingModelIndex, FoldError> {
        self.slots
            .get(model.slot())
            .and_then(Option::as_ref)
            .ok_or_else(|| unknown_model(model))
    }

    /// Returns the index of a live model mutably.
    pub fn get_mut(&mut self, model: ModelRef) -> Result<&mut WorkingModelIndex, FoldError> {
        self.slots
            .get_mut(model.slot())
            .and_then(Option::as_mut)
            .ok_or_else(|| unknown_model(model))
    }

    /// Replaces the stored index of a live model with an updated copy.
    pub fn replace(&mut self, index: WorkingModelIndex) -> Result<(), FoldError> {
        let slot = self.get_mut(index.owner())?;
        *slot = index;
        Ok(())
    }

    /// Removes a live model and unlinks it from every sibling set.
    pub fn take(&mut self, model: ModelRef) -> Result<WorkingModelIndex, FoldError> {
        let index = self
            .slots
            .get_mut(model.slot())
            .and_then(Option::take)
            .ok_or_else(|| unknown_model(model))?;
        for slot in self.slots.iter_mut().flatten() {
            slot.remove_sibling(model);
        }
        debug!("model {model} left the live set");
        Ok(index)
    }

    /// Puts a previously taken index back under its own handle.
    pub fn restore(&mut self, mut index: WorkingModelIndex) -> Result<(), FoldError> {
        let model = index.owner();
        if self.contains(model) {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model handle is already live")
                    .with_context("model", model),
            ));
        }
        for &pos in index.positions() {
            if let Some(owner) = self.owner_of(pos) {
                return Err(ownership_conflict(pos, owner, model));
            }
        }
        let live = self.live_refs();
        for sibling in index.siblings().clone() {
            if !live.contains(&sibling) {
                index.remove_sibling(sibling);
            }
        }
        for other in &live {
            index.add_sibling(*other);
        }
        for slot in self.slots.iter_mut().flatten() {
            slot.add_sibling(model);
        }
        if self.slots.len() <= model.slot() {
            self.slots.resize(model.slot() + 1, None);
        }
        self.slots[model.slot()] = Some(index);
        Ok(())
    }

    /// Live model instantiating `pos`, if any.
    pub fn owner_of(&self, pos: Position) -> Option<ModelRef> {
        self.slots
            .iter()
            .flatten()
            .find(|index| index.contains(pos))
            .map(WorkingModelIndex::owner)
    }

    /// Union of positions instantiated by live models.
    pub fn owned_positions(&self) -> BTreeSet<Position> {
        self.slots
            .iter()
            .flatten()
            .flat_map(|index| index.positions().iter().copied())
            .collect()
    }

    /// Fails if two live models instantiate the same position or sibling
    /// sets are out of sync with the live set.
    pub fn verify_disjoint(&self) -> Result<(), FoldError> {
        let mut seen: BTreeMap<Position, ModelRef> = BTreeMap::new();
        let live: BTreeSet<ModelRef> = self.live_refs().into_iter().collect();
        for index in self.slots.iter().flatten() {
            for &pos in index.positions() {
                if let Some(&owner) = seen.get(&pos) {
                    return Err(ownership_conflict(pos, owner, index.owner()));
                }
                seen.insert(pos, index.owner());
            }
            let mut expected = live.clone();
            expected.remove(&index.owner());
            if index.siblings() != &expected {
                return Err(FoldError::Annotation(
                    ErrorInfo::new(
                        codes::OWNERSHIP_CONFLICT,
                        "sibling set does not match the live models",
                    )
                    .with_context("model", index.owner())
                    .with_context("siblings", index.siblings().len())
                    .with_context("expected", expected.len()),
                ));
            }
        }
        Ok(())
    }

    /// Merges `sibling` into `host`; the sibling handle leaves the live set.
    ///
    /// Nothing changes on error.
    pub fn absorb(
        &mut self,
        host: ModelRef,
        sibling: ModelRef,
        at: InsertionPoint,
        global: &GlobalSequenceModel,
    ) -> Result<AbsorbReport, FoldError> {
        let mut merged = self.get(host)?.clone();
        let incoming = self.get(sibling)?.clone();
        if !merged.siblings().contains(&sibling) {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model is not a sibling of the host")
                    .with_context("model", host)
                    .with_context("sibling", sibling),
            ));
        }
        let report = merged.absorb(incoming, at, global)?;
        self.take(sibling)?;
        self.replace(merged)?;
        debug!("model {host} absorbed {sibling}");
        Ok(report)
    }

    /// Extracts a contiguous local run of `host` into a live model under
    /// `new_owner`, which must be vacant.
    pub fn split(
        &mut self,
        host: ModelRef,
        range: RangeInclusive<LocalPosition>,
        new_owner: ModelRef,
        allow_empty: bool,
    ) -> Result<(), FoldError> {
        if self.contains(new_owner) {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "split target is already live")
                    .with_context("model", new_owner),
            ));
        }
        let mut remaining = self.get(host)?.clone();
        let extracted = remaining.split(range, new_owner, allow_empty)?;
        self.replace(remaining)?;
        self.restore(extracted)?;
        debug!("model {new_owner} split out of {host}");
        Ok(())
    }

    /// Handle the next call to [`ModelRegistry::register`] will return.
    pub fn next_ref(&self) -> ModelRef {
        ModelRef::from_raw(self.slots.len() as u32)
    }

    /// Iterates over live indices in handle order.
    pub fn iter(&self) -> impl Iterator<Item = &WorkingModelIndex> {
        self.slots.iter().flatten()
    }
}

fn unknown_model(model: ModelRef) -> FoldError {
    FoldError::Rejected(
        ErrorInfo::new(codes::INVALID_MOVE, "model is not live").with_context("model", model),
    )
}

fn ownership_conflict(pos: Position, owner: ModelRef, requested: ModelRef) -> FoldError {
    FoldError::Annotation(
        ErrorInfo::new(
            codes::OWNERSHIP_CONFLICT,
            "position is already instantiated by another model",
        )
        .with_context("position", pos)
        .with_context("owner", owner)
        .with_context("requested", requested),
    )
}
