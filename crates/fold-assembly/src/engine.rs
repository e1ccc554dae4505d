use std::collections::BTreeMap;

use fold_core::errors::{codes, ErrorInfo, FoldError};
use fold_core::{
    GlobalSequenceModel, InsertionPoint, LocalPosition, ModelRef, ModelRegistry, Position,
    WorkingModelIndex,
};
use fold_tree::{insert_bonded_leaf, remove_leaf, EdgeKind, FoldTree, FoldTreeBuilder, TreeBuildOptions};
use log::{debug, info, trace};

use crate::config::{LastElementPolicy, MovePolicy};
use crate::moves::{AssemblyMove, AttachmentKind, Junction, MoveOutcome};

/// Owns the global annotations, every live working model and its fold tree.
///
/// Moves are all-or-nothing: work happens on copies that are committed only
/// once every step has succeeded.
#[derive(Debug, Clone)]
pub struct AssemblyEngine {
    global: GlobalSequenceModel,
    registry: ModelRegistry,
    trees: BTreeMap<ModelRef, FoldTree>,
    policy: MovePolicy,
    tree_options: TreeBuildOptions,
    moves_applied: u64,
}

impl AssemblyEngine {
    /// Creates an engine without any model.
    pub fn new(global: GlobalSequenceModel, policy: MovePolicy, tree_options: TreeBuildOptions) -> Self {
        Self {
            global,
            registry: ModelRegistry::new(),
            trees: BTreeMap::new(),
            policy,
            tree_options,
            moves_applied: 0,
        }
    }

    pub(crate) fn from_parts(
        global: GlobalSequenceModel,
        registry: ModelRegistry,
        trees: BTreeMap<ModelRef, FoldTree>,
        policy: MovePolicy,
        tree_options: TreeBuildOptions,
        moves_applied: u64,
    ) -> Self {
        Self {
            global,
            registry,
            trees,
            policy,
            tree_options,
            moves_applied,
        }
    }

    /// Registers a working model over `seed` and builds its tree.
    pub fn add_model(&mut self, seed: Vec<Position>) -> Result<ModelRef, FoldError> {
        let mut registry = self.registry.clone();
        let model = registry.register(seed, &self.global)?;
        let tree = self.builder().build(registry.get(model)?)?;
        debug!("model {model} starts with {} elements", tree.size());
        self.registry = registry;
        self.trees.insert(model, tree);
        Ok(model)
    }

    /// Removes a model from the live set, returning its index.
    pub fn discard_model(&mut self, model: ModelRef) -> Result<WorkingModelIndex, FoldError> {
        let index = self.registry.take(model)?;
        self.trees.remove(&model);
        info!("discarded model {model} ({} elements)", index.len());
        Ok(index)
    }

    /// Shared annotations.
    pub fn global(&self) -> &GlobalSequenceModel {
        &self.global
    }

    /// All live working models.
    pub fn registry(&self) -> &ModelRegistry {
        &self.registry
    }

    /// Handles of live models.
    pub fn live_models(&self) -> Vec<ModelRef> {
        self.registry.live_refs()
    }

    /// Index of a live model.
    pub fn index(&self, model: ModelRef) -> Result<&WorkingModelIndex, FoldError> {
        self.registry.get(model)
    }

    /// Current tree of a live model.
    pub fn tree(&self, model: ModelRef) -> Result<&FoldTree, FoldError> {
        self.trees.get(&model).ok_or_else(|| {
            FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model is not live").with_context("model", model),
            )
        })
    }

    /// Trees of every live model.
    pub fn trees(&self) -> &BTreeMap<ModelRef, FoldTree> {
        &self.trees
    }

    /// Move execution policy.
    pub fn policy(&self) -> &MovePolicy {
        &self.policy
    }

    /// Options handed to the tree builder.
    pub fn tree_options(&self) -> &TreeBuildOptions {
        &self.tree_options
    }

    /// Number of moves applied since the engine was created.
    pub fn moves_applied(&self) -> u64 {
        self.moves_applied
    }

    /// Rebuilds the tree of `model` from its index.
    pub fn rebuild(&mut self, model: ModelRef) -> Result<&FoldTree, FoldError> {
        let tree = self.builder().build(self.registry.get(model)?)?;
        debug!("rebuilt tree of model {model}");
        self.trees.insert(model, tree);
        self.tree(model)
    }

    /// Grows the shared annotations and rebuilds every live tree.
    ///
    /// Nothing changes if `update` or any rebuild fails.
    pub fn annotate<F>(&mut self, update: F) -> Result<(), FoldError>
    where
        F: FnOnce(&mut GlobalSequenceModel) -> Result<(), FoldError>,
    {
        let mut global = self.global.clone();
        update(&mut global)?;
        let builder = FoldTreeBuilder::new(&global, self.tree_options.clone());
        let mut trees = BTreeMap::new();
        for index in self.registry.iter() {
            index.verify(&global)?;
            trees.insert(index.owner(), builder.build(index)?);
        }
        debug!("annotations updated; rebuilt {} trees", trees.len());
        self.global = global;
        self.trees = trees;
        Ok(())
    }

    /// Executes `mv` against `model`.
    ///
    /// Lookup and ordering failures surface as `invalid-move` carrying the
    /// original code under `cause`.
    pub fn apply(&mut self, model: ModelRef, mv: &AssemblyMove) -> Result<MoveOutcome, FoldError> {
        let result = match *mv {
            AssemblyMove::Add {
                position,
                attach_to,
            } => self.apply_add(model, position, attach_to),
            AssemblyMove::Delete { position } => self.apply_delete(model, position),
            AssemblyMove::SpliceIn { sibling, junction } => {
                self.apply_splice_in(model, sibling, junction)
            }
            AssemblyMove::SpliceOut { sibling } => self.apply_splice_out(model, sibling),
        };
        match result {
            Ok(outcome) => {
                if outcome.applied {
                    self.moves_applied += 1;
                    debug!(
                        "{} on model {model} applied (touched {:?}, rebuilt {})",
                        mv.label(),
                        outcome.touched,
                        outcome.rebuilt
                    );
                }
                Ok(outcome)
            }
            Err(err) => {
                let err = at_boundary(err).with_context("move", mv.label());
                if err.is_rejection() {
                    trace!("{} on model {model} rejected: {err}", mv.label());
                }
                Err(err)
            }
        }
    }

    /// Checks numbering, ownership, and tree invariants of every live model.
    pub fn verify(&self) -> Result<(), FoldError> {
        self.registry.verify_disjoint()?;
        if self.trees.len() != self.registry.len() {
            return Err(FoldError::Structure(
                ErrorInfo::new(codes::INVALID_TREE, "tree set differs from live models")
                    .with_context("trees", self.trees.len())
                    .with_context("models", self.registry.len()),
            ));
        }
        for index in self.registry.iter() {
            let model = index.owner();
            index.verify(&self.global)?;
            for (idx, &pos) in index.positions().iter().enumerate() {
                if index.to_local(pos)? != idx + 1 {
                    return Err(FoldError::Structure(
                        ErrorInfo::new(codes::INVALID_TREE, "numbering does not round trip")
                            .with_context("model", model)
                            .with_context("position", pos),
                    ));
                }
            }
            let tree = self.tree(model)?;
            tree.validate().map_err(|err| err.with_context("model", model))?;
            tree.check_bonds(index.positions(), &self.global)
                .map_err(|err| err.with_context("model", model))?;
        }
        Ok(())
    }

    fn builder(&self) -> FoldTreeBuilder<'_> {
        FoldTreeBuilder::new(&self.global, self.tree_options.clone())
    }

    fn apply_add(
        &mut self,
        model: ModelRef,
        position: Position,
        attach_to: Position,
    ) -> Result<MoveOutcome, FoldError> {
        let mut next = self.registry.get(model)?.clone();
        for pos in [position, attach_to] {
            if !self.global.in_range(pos) {
                return Err(invalid_move("position outside target sequence", pos)
                    .with_context("cause", codes::POSITION_OUT_OF_RANGE));
            }
        }
        if position == attach_to {
            return Err(invalid_move("cannot attach a position to itself", position));
        }
        if next.contains(position) {
            return Err(invalid_move("position already instantiated by model", position)
                .with_context("model", model));
        }
        if !next.contains(attach_to) {
            return Err(invalid_move("attachment position is not instantiated", attach_to)
                .with_context("model", model)
                .with_context("cause", codes::NOT_PRESENT));
        }

        let attachment = AttachmentKind::classify(&self.global, position, attach_to);
        if let Some(owner) = self.registry.owner_of(position) {
            let junction = if attachment.is_bond() {
                Junction::Bond
            } else {
                Junction::JumpAt {
                    from: attach_to,
                    to: position,
                }
            };
            debug!("add of {position} reaches model {owner}; splicing it in");
            let mut outcome = self.apply_splice_in(model, owner, junction)?;
            outcome.attachment = Some(attachment);
            return Ok(outcome);
        }

        let attach_local = next.to_local(attach_to)?;
        let mut outcome = MoveOutcome::new(model);
        outcome.attachment = Some(attachment);

        let tree = if attachment.is_bond() {
            let new_local = if position > attach_to {
                next.insert_after_local(attach_local, position, &self.global)?
            } else {
                next.insert_before_local(attach_local, position, &self.global)?
            };
            outcome.touched.push(new_local);
            let far_side = if position > attach_to {
                position + 1
            } else {
                position.wrapping_sub(1)
            };
            let crowded = self.global.position_is_adjacent_in_sequence(position, far_side)
                && next.contains(far_side);
            let closed = self.global.is_closed_cutpoint(position.min(attach_to));
            let requested = self.global.requested_roots().contains(&position)
                || self
                    .global
                    .requested_jump_pairs()
                    .iter()
                    .any(|&(a, b)| a == position || b == position);
            let patched = if crowded || closed || requested {
                None
            } else {
                let current = self.tree(model)?;
                insert_bonded_leaf(current, new_local, next.to_local(attach_to)?).ok()
            };
            match patched {
                Some(tree) => tree,
                None => {
                    outcome.rebuilt = true;
                    self.builder().build(&next)?
                }
            }
        } else {
            // Sit next to a present sequence neighbour so the builder bonds to it.
            let bonded_before = position
                .checked_sub(1)
                .filter(|&pos| {
                    self.global.position_is_adjacent_in_sequence(position, pos) && next.contains(pos)
                });
            let bonded_after = Some(position + 1).filter(|&pos| {
                self.global.position_is_adjacent_in_sequence(position, pos) && next.contains(pos)
            });
            let new_local = if let Some(before) = bonded_before {
                next.insert_after_local(next.to_local(before)?, position, &self.global)?
            } else if let Some(after) = bonded_after {
                next.insert_before_local(next.to_local(after)?, position, &self.global)?
            } else if position > attach_to {
                let anchor = (attach_to..position)
                    .rev()
                    .find(|&pos| next.contains(pos))
                    .unwrap_or(attach_to);
                next.insert_after_local(next.to_local(anchor)?, position, &self.global)?
            } else {
                let anchor = (position + 1..=attach_to)
                    .find(|&pos| next.contains(pos))
                    .unwrap_or(attach_to);
                next.insert_before_local(next.to_local(anchor)?, position, &self.global)?
            };
            outcome.touched.push(new_local);
            next.add_jump_hint(attach_to, position);
            outcome.rebuilt = true;
            self.builder().build(&next)?
        };

        self.registry.replace(next)?;
        self.trees.insert(model, tree);
        Ok(outcome)
    }

    fn apply_delete(&mut self, model: ModelRef, position: Position) -> Result<MoveOutcome, FoldError> {
        let mut next = self.registry.get(model)?.clone();
        if !next.contains(position) {
            return Err(invalid_move("position is not instantiated by model", position)
                .with_context("model", model)
                .with_context("cause", codes::NOT_PRESENT));
        }
        let domain = self.global.domain_of(position);
        if self.policy.protect_fixed_domains && !domain.is_free() {
            return Err(invalid_move("position belongs to a fixed domain", position)
                .with_context("domain", domain.as_raw()));
        }
        let local = next.to_local(position)?;
        let mut outcome = MoveOutcome::new(model);
        outcome.touched.push(local);

        if next.len() == 1 {
            match self.policy.last_element {
                LastElementPolicy::Reject => {
                    return Err(FoldError::Rejected(
                        ErrorInfo::new(codes::WOULD_EMPTY_MODEL, "cannot remove last element of model")
                            .with_context("model", model)
                            .with_context("position", position),
                    ));
                }
                LastElementPolicy::NoOp => {
                    outcome.applied = false;
                    outcome.touched.clear();
                    return Ok(outcome);
                }
                LastElementPolicy::Discard => {
                    self.discard_model(model)?;
                    outcome.discarded = true;
                    return Ok(outcome);
                }
            }
        }

        next.remove_local(local, false)?;
        let current = self.tree(model)?;
        let bonded_leaf = local != current.root()
            && current.is_leaf(local)
            && current
                .parent_of(local)
                .is_some_and(|edge| edge.kind == EdgeKind::Bond);
        let patched = if bonded_leaf {
            remove_leaf(current, local).ok()
        } else {
            None
        };
        let tree = match patched {
            Some(tree) => tree,
            None => {
                outcome.rebuilt = true;
                self.builder().build(&next)?
            }
        };

        self.registry.replace(next)?;
        self.trees.insert(model, tree);
        Ok(outcome)
    }

    fn apply_splice_in(
        &mut self,
        model: ModelRef,
        sibling: ModelRef,
        junction: Junction,
    ) -> Result<MoveOutcome, FoldError> {
        if sibling == model {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model cannot splice in itself")
                    .with_context("model", model),
            ));
        }
        let host = self.registry.get(model)?;
        let incoming = self.registry.get(sibling)?;
        if !host.siblings().contains(&sibling) {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model is not a sibling of the host")
                    .with_context("model", model)
                    .with_context("sibling", sibling),
            ));
        }
        let bonded_pair = incoming.positions().iter().find_map(|&b| {
            [b.wrapping_sub(1), b + 1]
                .into_iter()
                .find(|&a| host.contains(a) && self.global.position_is_adjacent_in_sequence(a, b))
                .map(|a| (a, b))
        });
        match junction {
            Junction::Bond if bonded_pair.is_none() => {
                return Err(splice_mismatch("bond junction needs a sequence-adjacent pair", model, sibling));
            }
            Junction::Jump if bonded_pair.is_some() => {
                return Err(splice_mismatch(
                    "jump junction between models that share a bonded pair",
                    model,
                    sibling,
                ));
            }
            Junction::JumpAt { from, to } => {
                let spans = (host.contains(from) && incoming.contains(to))
                    || (host.contains(to) && incoming.contains(from));
                if !spans || self.global.position_is_adjacent_in_sequence(from, to) {
                    return Err(splice_mismatch("jump anchors must be non-adjacent and span both models", model, sibling)
                        .with_context("from", from)
                        .with_context("to", to));
                }
            }
            _ => {}
        }

        let mut registry = self.registry.clone();
        let report = registry.absorb(model, sibling, InsertionPoint::Sorted, &self.global)?;
        if let Junction::JumpAt { from, to } = junction {
            registry.get_mut(model)?.add_jump_hint(from, to);
        }
        let tree = self.builder().build(registry.get(model)?)?;

        self.registry = registry;
        self.trees.remove(&sibling);
        self.trees.insert(model, tree);
        let mut outcome = MoveOutcome::new(model);
        outcome.touched = report.absorbed_locals;
        outcome.rebuilt = true;
        Ok(outcome)
    }

    fn apply_splice_out(&mut self, model: ModelRef, sibling: ModelRef) -> Result<MoveOutcome, FoldError> {
        let host = self.registry.get(model)?;
        if self.registry.contains(sibling) {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model is already live")
                    .with_context("sibling", sibling),
            ));
        }
        let Some(absorbed) = host.absorbed().get(&sibling) else {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "model was never spliced into the host")
                    .with_context("model", model)
                    .with_context("sibling", sibling),
            ));
        };
        let mut locals: Vec<LocalPosition> = absorbed
            .iter()
            .map(|&pos| host.to_local(pos))
            .collect::<Result<_, _>>()?;
        locals.sort_unstable();
        let (first, last) = match (locals.first(), locals.last()) {
            (Some(&first), Some(&last)) => (first, last),
            _ => {
                return Err(FoldError::Rejected(
                    ErrorInfo::new(codes::INVALID_MOVE, "no absorbed positions remain")
                        .with_context("sibling", sibling),
                ));
            }
        };
        if last + 1 - first != locals.len() {
            return Err(FoldError::Rejected(
                ErrorInfo::new(codes::INVALID_MOVE, "absorbed positions are no longer contiguous")
                    .with_context("sibling", sibling)
                    .with_context("first", first)
                    .with_context("last", last),
            ));
        }

        let mut registry = self.registry.clone();
        registry.split(model, first..=last, sibling, false)?;
        let builder = self.builder();
        let host_tree = builder.build(registry.get(model)?)?;
        let sibling_tree = builder.build(registry.get(sibling)?)?;

        self.registry = registry;
        self.trees.insert(model, host_tree);
        self.trees.insert(sibling, sibling_tree);
        let mut outcome = MoveOutcome::new(model);
        outcome.touched = (first..=last).collect();
        outcome.rebuilt = true;
        Ok(outcome)
    }
}

fn invalid_move(message: &str, position: Position) -> FoldError {
    FoldError::Rejected(ErrorInfo::new(codes::INVALID_MOVE, message).with_context("position", position))
}

fn splice_mismatch(message: &str, model: ModelRef, sibling: ModelRef) -> FoldError {
    FoldError::Rejected(
        ErrorInfo::new(codes::INVALID_MOVE, message)
            .with_context("model", model)
            .with_context("sibling", sibling)
            .with_context("cause", "attachment-mismatch"),
    )
}

fn at_boundary(err: FoldError) -> FoldError {
    match err {
        FoldError::Rejected(info) if info.code == codes::NOT_PRESENT || info.code == codes::OUT_OF_ORDER => {
            let cause = info.code.clone();
            FoldError::Rejected(ErrorInfo {
                code: codes::INVALID_MOVE.to_string(),
                ..info
            })
            .with_context("cause", cause)
        }
        other => other,
    }
}
