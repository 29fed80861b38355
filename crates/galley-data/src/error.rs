use std::path::PathBuf;

use galley_engine::EngineError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DataError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("CSV error in {file}: {source}")]
    Csv {
        file: String,
        #[source]
        source: csv::Error,
    },

    #[error("{file}: missing column '{column}'")]
    MissingColumn { file: String, column: String },

    #[error("{file} line {line}: {message}")]
    InvalidValue { file: String, line: u64, message: String },

    #[error("Invalid flight label: {0}")]
    InvalidFlightLabel(String),

    #[error(transparent)]
    Engine(#[from] EngineError),
}

pub type Result<T> = std::result::Result<T, DataError>;

impl DataError {
    pub(crate) fn csv(file: &str, source: csv::Error) -> Self {
        DataError::Csv { file: file.to_string(), source }
    }

    pub(crate) fn invalid(file: &str, line: u64, message: impl Into<String>) -> Self {
        DataError::InvalidValue { file: file.to_string(), line, message: message.into() }
    }
}
