use std::fs;
use std::path::Path;

use fold_core::errors::{codes, ErrorInfo, FoldError};
use fold_core::{Position, SequenceAnnotations};
use fold_tree::TreeBuildOptions;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// YAML-configurable description of an assembly run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunConfiguration {
    /// Full target sequence, one character per position.
    pub sequence: String,
    /// Positions after which the chain is broken.
    #[serde(default)]
    pub cutpoint_open: Vec<Position>,
    /// Positions after which a loop-closure bond crosses a tree cut.
    #[serde(default)]
    pub cutpoint_closed: Vec<Position>,
    /// Extra positions allowed to move during minimization.
    #[serde(default)]
    pub extra_min_res: Vec<Position>,
    /// Positions eligible for resampling.
    #[serde(default)]
    pub sample_res: Vec<Position>,
    /// Requested jump partners.
    #[serde(default)]
    pub jump_pairs: Vec<(Position, Position)>,
    /// Requested tree roots.
    #[serde(default)]
    pub root_res: Vec<Position>,
    /// Seed working models, registered in order.
    #[serde(default)]
    pub models: Vec<ModelSeed>,
    /// Move execution policy.
    #[serde(default)]
    pub policy: MovePolicy,
    /// Tree derivation options.
    #[serde(default)]
    pub tree: TreeBuildOptions,
    /// Terminus move proposal settings.
    #[serde(default)]
    pub proposal: ProposalConfig,
    /// Master seed for move proposals.
    #[serde(default = "default_seed")]
    pub seed: u64,
}

fn default_seed() -> u64 {
    0x5EED_F01D
}

/// Initial element list of one working model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelSeed {
    /// Global positions instantiated by the model, in local order.
    pub res_list: Vec<Position>,
    /// Positions after which the input structure is broken even though the
    /// numbering continues.
    #[serde(default)]
    pub chain_breaks: Vec<Position>,
}

/// What `Delete` does with the last element of a model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LastElementPolicy {
    /// Fail with `would-empty-model`.
    #[default]
    Reject,
    /// Report a non-applied outcome without error.
    NoOp,
    /// Remove the emptied model from the live set.
    Discard,
}

/// Rules applied by the engine while executing moves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MovePolicy {
    /// Handling of deletes that would empty a model.
    #[serde(default)]
    pub last_element: LastElementPolicy,
    /// Refuse to delete positions that carry a nonzero fixed domain.
    #[serde(default = "default_true")]
    pub protect_fixed_domains: bool,
}

fn default_true() -> bool {
    true
}

impl Default for MovePolicy {
    fn default() -> Self {
        Self {
            last_element: LastElementPolicy::default(),
            protect_fixed_domains: default_true(),
        }
    }
}

/// Controls which terminus moves the proposer offers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalConfig {
    /// Do not offer jump adds that skip one position.
    #[serde(default = "default_true")]
    pub disallow_skip_bulge: bool,
    /// Never offer deletions.
    #[serde(default)]
    pub skip_deletions: bool,
    /// Do not offer deleting the only element of a model.
    #[serde(default = "default_true")]
    pub disallow_delete_last: bool,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            disallow_skip_bulge: default_true(),
            skip_deletions: false,
            disallow_delete_last: default_true(),
        }
    }
}

impl RunConfiguration {
    /// Minimal configuration over `sequence` with defaults everywhere else.
    pub fn for_sequence(sequence: impl Into<String>) -> Self {
        Self {
            sequence: sequence.into(),
            cutpoint_open: Vec::new(),
            cutpoint_closed: Vec::new(),
            extra_min_res: Vec::new(),
            sample_res: Vec::new(),
            jump_pairs: Vec::new(),
            root_res: Vec::new(),
            models: Vec::new(),
            policy: MovePolicy::default(),
            tree: TreeBuildOptions::default(),
            proposal: ProposalConfig::default(),
            seed: default_seed(),
        }
    }

    /// Parses a YAML document.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, FoldError> {
        serde_yaml::from_str(yaml).map_err(|err| {
            let info = ErrorInfo::new(codes::CONFIG_PARSE, err.to_string());
            let info = match err.location() {
                Some(location) => info
                    .with_context("line", location.line())
                    .with_context("column", location.column()),
                None => info,
            };
            FoldError::Config(info)
        })
    }

    /// Reads and parses a YAML file.
    pub fn from_path(path: &Path) -> Result<Self, FoldError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            FoldError::Config(
                ErrorInfo::new(codes::CONFIG_READ, err.to_string())
                    .with_context("path", path.display()),
            )
        })?;
        Self::from_yaml_str(&contents).map_err(|err| err.with_context("path", path.display()))
    }

    /// Renders the configuration as YAML.
    pub fn to_yaml(&self) -> Result<String, FoldError> {
        serde_yaml::to_string(self)
            .map_err(|err| FoldError::Serde(ErrorInfo::new("serialize-yaml", err.to_string())))
    }

    /// Sequence-level annotations declared by the configuration.
    pub fn annotations(&self) -> SequenceAnnotations {
        SequenceAnnotations {
            sequence: self.sequence.clone(),
            open_cutpoints: self.cutpoint_open.clone(),
            closed_cutpoints: self.cutpoint_closed.clone(),
            extra_minimize: self.extra_min_res.clone(),
            sample_positions: self.sample_res.clone(),
            jump_pairs: self.jump_pairs.clone(),
            roots: self.root_res.clone(),
        }
    }

    /// SHA-256 of the canonical JSON rendering, recorded in checkpoints.
    pub fn config_hash(&self) -> Result<String, FoldError> {
        let json = serde_json::to_vec(self)
            .map_err(|err| FoldError::Serde(ErrorInfo::new("serialize-json", err.to_string())))?;
        Ok(format!("{:x}", Sha256::digest(&json)))
    }
}
