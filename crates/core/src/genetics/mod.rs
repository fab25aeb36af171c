// Genetics module
// Flattened records, ancestor graph, path enumeration, Wright coefficients

pub mod memo;
pub mod paths;
pub mod pedigree;
pub mod records;
pub mod relatedness;

pub use memo::{MemoScope, MemoScopeKind, NoMemo, SharedMemo, UnitMemo};
pub use paths::{AncestorPath, PathEnumerator};
pub use pedigree::{AttachPolicy, Individual, PedigreeGraph};
pub use records::{AncestorRecord, AncestorSlot};
pub use relatedness::{Estimate, Outcome, PathMode, RelatednessEngine};
