#[cfg(feature = "python")]
use pyo3::exceptions::{PyRuntimeError, PyValueError};
#[cfg(feature = "python")]
use pyo3::PyErr;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EsgError {
    #[error("Missing column: {0}")]
    MissingColumn(String),

    #[error("Polars error: {0}")]
    Polars(#[from] polars::error::PolarsError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("{0}")]
    General(String),

    #[error("InvalidData: {0}")]
    InvalidData(String),
}

pub type Result<T> = std::result::Result<T, EsgError>;

#[cfg(feature = "python")]
impl From<EsgError> for PyErr {
    fn from(err: EsgError) -> PyErr {
        match err {
            EsgError::InvalidData(_) | EsgError::MissingColumn(_) => {
                PyValueError::new_err(err.to_string())
            }
            _ => PyRuntimeError::new_err(err.to_string()),
        }
    }
}

#[cfg(feature = "python")]
impl From<PyErr> for EsgError {
    fn from(err: PyErr) -> Self {
        EsgError::General(err.to_string())
    }
}
