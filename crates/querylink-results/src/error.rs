/// Reasons a result frame could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    /// The payload is not valid JSON, even after unwrapping one layer of quoting.
    #[error("malformed result payload: {0}")]
    Syntax(#[from] serde_json::Error),

    /// The payload is valid JSON but neither an array nor an object with a
    /// `results` array.
    #[error("unexpected result payload shape: {found}")]
    UnexpectedShape { found: &'static str },
}

pub type Result<T> = std::result::Result<T, DecodeError>;
