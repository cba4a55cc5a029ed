use thiserror::Error;

#[derive(Error, Debug)]
pub enum PedigreeError {
    #[error("Registry error: {0}")]
    Registry(String),

    #[error("Column '{0}' not found in registry file")]
    ColumnNotFound(String),

    #[error("Snapshot error: {0}")]
    Snapshot(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
}

pub type Result<T> = std::result::Result<T, PedigreeError>;
