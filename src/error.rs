/// Result type used throughout the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Every failure is a violated precondition, reported to the immediate caller with a
/// human-readable reason.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("malformed data: {0}")]
    MalformedData(String),

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),
}

impl Error {
    pub(crate) fn dimension_mismatch(what: &str, expected: usize, found: usize) -> Self {
        Self::DimensionMismatch(format!("{what}: expected {expected}, found {found}"))
    }
}
