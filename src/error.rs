use std::path::PathBuf;

use thiserror::Error;

/// Everything that can stop a pipeline. None of these are recovered from.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{}: schema has {expected} columns but the file has {found}", path.display())]
    SchemaMismatch {
        path: PathBuf,
        expected: usize,
        found: usize,
    },

    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: u64,
        message: String,
    },

    #[error("Column `{column}` has code {code} with no label")]
    UnmappedCode { column: String, code: i64 },

    #[error("Column `{column}` is not numeric (found {value})")]
    TypeMismatch { column: String, value: String },

    #[error("No column named `{0}`")]
    UnknownColumn(String),

    #[error("Cannot render chart: {0}")]
    Render(String),

    #[error("Invalid configuration: {0}")]
    Config(String),
}

pub type Result<T> = core::result::Result<T, Error>;

impl Error {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}

impl From<pyo3::PyErr> for Error {
    fn from(err: pyo3::PyErr) -> Self {
        Error::Render(err.to_string())
    }
}

impl From<std::ffi::NulError> for Error {
    fn from(err: std::ffi::NulError) -> Self {
        Error::Render(err.to_string())
    }
}
