use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Invalid position sample: {0}")]
    InvalidSample(String),

    #[error("Invalid alert event: {0}")]
    InvalidAlert(String),

    #[error("Invalid zone definition: {0}")]
    InvalidZone(String),

    #[error("Zone lookup failed: {0}")]
    ZoneLookupFailed(String),

    #[error("Zone lookup timed out after {0} ms")]
    ZoneLookupTimeout(u64),

    #[error("Publish error: {0}")]
    PublishError(String),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}
