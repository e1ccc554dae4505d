//! Structured error types shared across stepfold crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable machine readable error codes.
pub mod codes {
    /// A position already belongs to a different fixed domain.
    pub const DOMAIN_CONFLICT: &str = "domain-conflict";
    /// A position was declared both an open and a closed cut point.
    pub const CUTPOINT_CONFLICT: &str = "cutpoint-conflict";
    /// A global position is instantiated by more than one live model.
    pub const OWNERSHIP_CONFLICT: &str = "ownership-conflict";
    /// A global position lies outside `1..=N`.
    pub const POSITION_OUT_OF_RANGE: &str = "position-out-of-range";
    /// A closed cut point cannot be hosted by the working model.
    pub const INVALID_CUTPOINT: &str = "invalid-cutpoint";
    /// Greedy jump assignment failed to connect every segment.
    pub const AMBIGUOUS_JUMP_ASSIGNMENT: &str = "ambiguous-jump-assignment";
    /// A fold tree failed structural validation.
    pub const INVALID_TREE: &str = "invalid-tree";
    /// A leaf patch was attempted on a node that is not a removable leaf.
    pub const NOT_A_LEAF: &str = "not-a-leaf";
    /// The move is not legal for the invoking model.
    pub const INVALID_MOVE: &str = "invalid-move";
    /// The move would remove the last element of a model.
    pub const WOULD_EMPTY_MODEL: &str = "would-empty-model";
    /// A global position is not instantiated by the model.
    pub const NOT_PRESENT: &str = "not-present";
    /// An insertion would break the adjacency ordering of a chain.
    pub const OUT_OF_ORDER: &str = "out-of-order";
    /// Configuration could not be read from disk.
    pub const CONFIG_READ: &str = "config-read";
    /// Configuration could not be parsed.
    pub const CONFIG_PARSE: &str = "config-parse";
    /// A seed model in the configuration is malformed.
    pub const INVALID_MODEL_SEED: &str = "invalid-model-seed";
}

/// Structured payload attached to every [`FoldError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (positions, model handles, sizes).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.context.insert(key.into(), value.to_string());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// How far an error propagates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Severity {
    /// Global state is corrupt; the run must stop.
    Fatal,
    /// The affected model must be discarded; the run may continue.
    ModelFatal,
    /// Nothing was mutated; the caller may propose another move.
    Rejection,
}

/// Canonical error type for stepwise fold assembly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum FoldError {
    /// Contradictory or out-of-range global annotations.
    #[error("annotation error: {0}")]
    Annotation(ErrorInfo),
    /// Fold tree construction or validation failures.
    #[error("structure error: {0}")]
    Structure(ErrorInfo),
    /// Per-move rejections; no state was mutated.
    #[error("move rejected: {0}")]
    Rejected(ErrorInfo),
    /// Run configuration errors.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Serialization and schema errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl FoldError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            FoldError::Annotation(info)
            | FoldError::Structure(info)
            | FoldError::Rejected(info)
            | FoldError::Config(info)
            | FoldError::Serde(info) => info,
        }
    }

    /// Returns the stable error code.
    pub fn code(&self) -> &str {
        &self.info().code
    }

    /// Classifies how far the error propagates.
    pub fn severity(&self) -> Severity {
        match self {
            FoldError::Rejected(_) => Severity::Rejection,
            FoldError::Structure(_) => Severity::ModelFatal,
            FoldError::Annotation(_) | FoldError::Config(_) | FoldError::Serde(_) => {
                Severity::Fatal
            }
        }
    }

    /// Returns `true` when the error left all state untouched.
    pub fn is_rejection(&self) -> bool {
        self.severity() == Severity::Rejection
    }

    /// Adds a context entry to the payload, keeping the family.
    pub fn with_context(self, key: impl Into<String>, value: impl ToString) -> Self {
        match self {
            FoldError::Annotation(info) => FoldError::Annotation(info.with_context(key, value)),
            FoldError::Structure(info) => FoldError::Structure(info.with_context(key, value)),
            FoldError::Rejected(info) => FoldError::Rejected(info.with_context(key, value)),
            FoldError::Config(info) => FoldError::Config(info.with_context(key, value)),
            FoldError::Serde(info) => FoldError::Serde(info.with_context(key, value)),
        }
    }

    /// Shorthand for a [`FoldError::Structure`] error.
    pub fn structure(code: &str, message: impl Into<String>) -> Self {
        FoldError::Structure(ErrorInfo::new(code, message))
    }

    /// Shorthand for a [`FoldError::Rejected`] error.
    pub fn rejected(code: &str, message: impl Into<String>) -> Self {
        FoldError::Rejected(ErrorInfo::new(code, message))
    }
}
