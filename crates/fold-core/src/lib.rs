#![deny(missing_docs)]
#![doc = "Global numbering, working-model indices and shared error types for stepwise fold assembly."]

pub mod errors;
mod ids;
pub mod index;
pub mod provenance;
pub mod registry;
pub mod rng;
pub mod sequence;

pub use errors::{codes, ErrorInfo, FoldError, Severity};
pub use ids::{DomainId, LocalPosition, ModelRef, Position};
pub use index::{check_adjacency_order, AbsorbReport, InsertionPoint, WorkingModelIndex};
pub use provenance::{RunProvenance, SchemaVersion};
pub use registry::ModelRegistry;
pub use rng::{cycle_seed, derive_substream_seed, RngHandle};
pub use sequence::{GlobalSequenceModel, SequenceAnnotations};
