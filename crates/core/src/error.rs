use thiserror::Error;

#[derive(Error, Debug)]
pub enum InbreedingError {
    #[error("Invalid identifier: {0}")]
    Validation(String),

    #[error("Input error: {0}")]
    Input(String),

    #[error("Pedigree error: {0}")]
    Pedigree(String),

    #[error("Unknown individual index {index} (graph holds {size} individuals)")]
    UnknownIndividual { index: usize, size: usize },

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, InbreedingError>;
