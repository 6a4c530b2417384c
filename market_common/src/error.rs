//! Error types shared between the market server and client.
//!
//! The `MarketError` enum unifies provider failures, storage failures, invalid
//! read queries and the usual I/O and serialization errors, allowing crates to
//! propagate a single error type.
use std::io;
use std::sync::PoisonError;

use thiserror::Error;

/// Unified error type shared by server and client.
#[derive(Error, Debug)]
pub enum MarketError {
    /// Network failure, timeout or non-2xx status from an external price source.
    #[error("{provider} unavailable: {reason}")]
    ProviderUnavailable {
        /// Provider identifier (e.g. `api-ninjas`).
        provider: String,
        /// Underlying cause.
        reason: String,
    },

    /// The external price source answered with a payload of unexpected shape.
    #[error("{provider} returned a malformed response: {reason}")]
    MalformedProviderResponse {
        /// Provider identifier.
        provider: String,
        /// What was wrong with the payload.
        reason: String,
    },

    /// Upserting a single quote into storage failed.
    #[error("Failed to store quote {commodity}@{market}: {reason}")]
    StorageWriteFailure {
        /// Commodity part of the upsert key.
        commodity: String,
        /// Market part of the upsert key.
        market: String,
        /// Underlying cause.
        reason: String,
    },

    /// A read request carried an invalid parameter.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// HTTP listener could not be started or answered with an error.
    #[error("Server error: {0}")]
    Server(String),

    /// I/O error originating from the standard library or sockets/files.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Failure while encoding/decoding JSON via serde_json.
    #[error("JSON serialization/deserialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// Failure while decoding a storage snapshot with `bincode`.
    #[error("Bincode deserialization error: {0}")]
    BincodeDecode(#[from] bincode::error::DecodeError),

    /// Failure while encoding a storage snapshot with `bincode`.
    #[error("Bincode serialization error: {0}")]
    BincodeEncode(#[from] bincode::error::EncodeError),

    /// Error indicating a poisoned mutex/lock was encountered.
    #[error("Mutex Lock Poisoned: {0}")]
    MutexLock(String),
}

impl MarketError {
    /// Build a `ProviderUnavailable` error for `provider` from any displayable cause.
    pub fn unavailable(provider: impl ToString, reason: impl ToString) -> Self {
        MarketError::ProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build a `MalformedProviderResponse` error for `provider`.
    pub fn malformed(provider: impl ToString, reason: impl ToString) -> Self {
        MarketError::MalformedProviderResponse {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Whether the error comes from an external price source.
    pub fn is_provider_failure(&self) -> bool {
        matches!(
            self,
            MarketError::ProviderUnavailable { .. } | MarketError::MalformedProviderResponse { .. }
        )
    }
}

impl<T> From<PoisonError<T>> for MarketError {
    fn from(err: PoisonError<T>) -> Self {
        MarketError::MutexLock(err.to_string())
    }
}
