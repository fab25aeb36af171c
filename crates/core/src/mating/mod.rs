// Mating module
// Computation units, candidate batches, reporting

pub mod session;

pub use session::{
    rank_by_coefficient, IndividualInbreeding, MatingBatch, MatingResult, PedigreeSession,
    SessionConfig, UnitGranularity,
};
