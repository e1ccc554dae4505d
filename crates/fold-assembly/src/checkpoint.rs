use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use fold_core::errors::{ErrorInfo, FoldError};
use fold_core::{GlobalSequenceModel, ModelRef, ModelRegistry, RunProvenance, SchemaVersion};
use fold_tree::{FoldTree, TreeBuildOptions};
use serde::{Deserialize, Serialize};

use crate::config::MovePolicy;
use crate::engine::AssemblyEngine;

/// Schema version written into every snapshot.
pub const SNAPSHOT_SCHEMA: SchemaVersion = SchemaVersion::new(1, 0, 0);

/// Serializable state of an [`AssemblyEngine`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Schema the snapshot was written with.
    pub schema_version: SchemaVersion,
    /// Run provenance at capture time.
    pub provenance: RunProvenance,
    /// Move execution policy.
    pub policy: MovePolicy,
    /// Tree derivation options.
    pub tree_options: TreeBuildOptions,
    /// Shared annotations.
    pub global: GlobalSequenceModel,
    /// Live working models.
    pub registry: ModelRegistry,
    /// Tree of each live model.
    pub trees: Vec<(ModelRef, FoldTree)>,
}

impl Snapshot {
    /// Captures the engine state together with run provenance.
    pub fn capture(engine: &AssemblyEngine, config_hash: impl Into<String>, seed: u64) -> Self {
        let mut tool_versions = BTreeMap::new();
        tool_versions.insert(
            env!("CARGO_PKG_NAME").to_string(),
            env!("CARGO_PKG_VERSION").to_string(),
        );
        Self {
            schema_version: SNAPSHOT_SCHEMA,
            provenance: RunProvenance {
                config_hash: config_hash.into(),
                seed,
                moves_applied: engine.moves_applied(),
                tool_versions,
            },
            policy: engine.policy().clone(),
            tree_options: engine.tree_options().clone(),
            global: engine.global().clone(),
            registry: engine.registry().clone(),
            trees: engine
                .trees()
                .iter()
                .map(|(model, tree)| (*model, tree.clone()))
                .collect(),
        }
    }

    /// Rebuilds an engine and re-checks every invariant.
    pub fn restore(&self) -> Result<AssemblyEngine, FoldError> {
        if !SNAPSHOT_SCHEMA.accepts(&self.schema_version) {
            return Err(FoldError::Serde(
                ErrorInfo::new("schema-mismatch", "unsupported snapshot schema")
                    .with_context("found", format!("{:?}", self.schema_version))
                    .with_context("expected", format!("{:?}", SNAPSHOT_SCHEMA)),
            ));
        }
        let engine = AssemblyEngine::from_parts(
            self.global.clone(),
            self.registry.clone(),
            self.trees.iter().cloned().collect(),
            self.policy.clone(),
            self.tree_options.clone(),
            self.provenance.moves_applied,
        );
        engine.verify()?;
        Ok(engine)
    }

    /// Reads a snapshot from disk.
    pub fn load(path: &Path) -> Result<Self, FoldError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            FoldError::Serde(
                ErrorInfo::new("checkpoint-read", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            FoldError::Serde(
                ErrorInfo::new("checkpoint-parse", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }

    /// Writes the snapshot to disk, creating parent directories.
    pub fn store(&self, path: &Path) -> Result<(), FoldError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|err| {
                FoldError::Serde(
                    ErrorInfo::new("checkpoint-mkdir", err.to_string())
                        .with_context("path", parent.display()),
                )
            })?;
        }
        let json = serde_json::to_string_pretty(self).map_err(|err| {
            FoldError::Serde(
                ErrorInfo::new("checkpoint-serialize", err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        fs::write(path, json).map_err(|err| {
            FoldError::Serde(
                ErrorInfo::new("checkpoint-write", err.to_string())
                    .with_context("path", path.display()),
            )
        })
    }
}

/// Snapshot file path for a given move count.
pub fn checkpoint_path(root: &Path, moves: u64) -> PathBuf {
    root.join(format!("snapshot_{moves:06}.json"))
}
