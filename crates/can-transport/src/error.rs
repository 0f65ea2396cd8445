use thiserror::Error;

pub type Result<T, E = TransportError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bus rejected frame: {0}")]
    Rejected(String),
    #[error("I/O error: {0}")]
    Io(String),
    #[error("invalid frame: {0}")]
    InvalidFrame(&'static str),
}
