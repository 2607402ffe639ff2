#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Data that cannot be laid out: negative or non-finite magnitudes, a zero total,
    /// mismatched columns, unknown ordering values.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("failed to parse chart document: {0}")]
    Parse(String),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }
}
