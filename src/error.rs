use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SCError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("singular matrix: {0}")]
    SingularMatrix(String),

    #[error("decomposition error: {0}")]
    Decomposition(String),
}

pub type Result<T> = std::result::Result<T, SCError>;

pub(crate) fn invalid<T>(msg: impl Into<String>) -> Result<T> {
    Err(SCError::InvalidInput(msg.into()))
}
