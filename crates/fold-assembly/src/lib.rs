#![deny(missing_docs)]

//! Incremental assembly of working models: configuration, the move engine,
//! terminus proposals, the sampling loop and checkpoints.

/// Snapshot persistence for engine state.
pub mod checkpoint;
/// YAML run configuration and move policies.
pub mod config;
/// Move execution against live working models.
pub mod engine;
/// Move vocabulary and outcomes.
pub mod moves;
/// Terminus move proposals.
pub mod propose;
/// Propose/apply/accept driver.
pub mod sampler;
/// Engine construction from a run configuration.
pub mod setup;

pub use checkpoint::{checkpoint_path, Snapshot, SNAPSHOT_SCHEMA};
pub use config::{LastElementPolicy, ModelSeed, MovePolicy, ProposalConfig, RunConfiguration};
pub use engine::AssemblyEngine;
pub use moves::{AssemblyMove, AttachmentKind, Junction, MoveOutcome};
pub use propose::MoveProposer;
pub use sampler::{run_cycles, AcceptAll, AcceptanceCriterion, SamplingSummary};
pub use setup::initialize;
