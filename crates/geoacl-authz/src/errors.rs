use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthzError {
    #[error("invalid id: {0}")]
    InvalidId(String),
    #[error("invalid address range: {0}")]
    InvalidAddressRange(String),
    #[error("invalid grant type: {0}")]
    InvalidGrant(String),
    #[error("geometry operation failed: {0}")]
    Geometry(String),
}

pub type AuthzResult<T> = Result<T, AuthzError>;
