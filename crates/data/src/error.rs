use thiserror::Error;

/// Errors raised while turning stored rows back into domain values.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("invalid decimal in column {column}: {value}")]
    InvalidDecimal { column: &'static str, value: String },
    #[error("invalid event kind: {0}")]
    InvalidKind(String),
    #[error("invalid event payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
    #[error("value out of range in column {0}")]
    OutOfRange(&'static str),
}
