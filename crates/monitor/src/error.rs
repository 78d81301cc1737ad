use clmm_yield_data::DataError;
use clmm_yield_domain::DomainError;
use thiserror::Error;

/// Errors surfaced by a portfolio report.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The wallet address is malformed.
    #[error("invalid wallet address: {0}")]
    InvalidAddress(String),
    /// The chain could not be reached for the run.
    #[error("upstream unavailable: {0}")]
    Upstream(String),
    #[error("storage error: {0}")]
    Storage(#[from] DataError),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Domain(#[from] DomainError),
}

impl MonitorError {
    pub(crate) fn upstream(context: &str, error: &anyhow::Error) -> Self {
        Self::Upstream(format!("{context}: {error:#}"))
    }
}
