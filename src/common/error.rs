use thiserror::Error;

/// Index error types
#[derive(Error, Debug)]
pub enum TreeError {
    #[error("duplicate key {key} in unique index {index}")]
    UniquenessViolation { index: String, key: String },

    #[error("corrupt index rows: {0}")]
    StructuralCorruption(String),

    #[error("unsorted bulk data: {0}")]
    UnsortedData(String),
}

pub type Result<T> = std::result::Result<T, TreeError>;
