use thiserror::Error;

use crate::modem::ModemError;

/// Errors surfaced by the framer and the data-link sessions.
#[derive(Debug, Error, Clone)]
pub enum LinkError {
    #[error("chunk size must be at least 1")]
    InvalidInput,
    #[error("empty message")]
    EmptyInput,
    #[error("invalid state: {0}")]
    InvalidState(&'static str),
    #[error("modem transmit failed: {0}")]
    TransmitFailed(ModemError),
    #[error("modem error: {0}")]
    Modem(#[from] ModemError),
}
