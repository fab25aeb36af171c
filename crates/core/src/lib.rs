pub mod data;
pub mod error;
pub mod genetics;
pub mod mating;
pub mod types;

pub use error::{InbreedingError, Result};
