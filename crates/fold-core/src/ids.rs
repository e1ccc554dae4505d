use serde::{Deserialize, Serialize};

/// 1-based index into the full target sequence, stable for a whole run.
pub type Position = usize;

/// 1-based index into one working model's instantiated element list.
pub type LocalPosition = usize;

/// Handle for a working model stored in a [`ModelRegistry`](crate::ModelRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ModelRef(u32);

impl ModelRef {
    /// Creates a handle from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the handle.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    pub(crate) fn slot(&self) -> usize {
        self.0 as usize
    }
}

impl std::fmt::Display for ModelRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "m{}", self.0)
    }
}

/// Fixed-domain label attached to a global position.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct DomainId(u32);

impl DomainId {
    /// Label of positions that are free to resample.
    pub const FREE: DomainId = DomainId(0);

    /// Creates a domain label from its raw integer representation.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw integer representation of the label.
    pub fn as_raw(&self) -> u32 {
        self.0
    }

    /// Returns `true` for the free label.
    pub fn is_free(&self) -> bool {
        self.0 == 0
    }
}
