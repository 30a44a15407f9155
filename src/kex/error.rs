use alloc::string::String;

use thiserror::Error;

use crate::utils::WireError;

/// Errors which can occur while establishing keys through a key exchange.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum KexError {
    #[error("random number generator failed to produce key material")]
    EntropyFailure,
    #[error("invalid peer public value: {0}")]
    InvalidPeerValue(String),
    #[error("unsupported key exchange algorithm `{0}`")]
    UnsupportedAlgorithm(String),
    #[error("shared secret has not been computed yet")]
    SharedSecretNotComputed,
    #[error("shared secret has already been computed for this exchange")]
    SharedSecretAlreadyComputed,
    #[error("exchange hash must be {expected} bytes long, found {actual}")]
    InvalidExchangeHashLength { expected: usize, actual: usize },
    #[error("failed to encode key exchange value")]
    Encoding(#[from] WireError),
}

impl KexError {
    pub(crate) fn invalid_peer_value(reason: impl core::fmt::Display) -> Self {
        KexError::InvalidPeerValue(format!("{reason}"))
    }
}
