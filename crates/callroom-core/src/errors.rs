use thiserror::Error;

#[derive(Debug, Error)]
pub enum CallError {
    #[error("invalid state: {0}")]
    InvalidState(String),
    #[error("credential must not be empty")]
    EmptyCredential,
    #[error("bridge payload rejected: {0}")]
    Bridge(String),
    #[error("permission error: {0}")]
    Permission(String),
    #[error("invalid config: {0}")]
    Config(String),
    #[error("call manager is shut down")]
    Closed,
}
