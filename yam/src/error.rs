//! Error type shared by the decoder, the mapper and record stores.

/// Errors raised while turning a chain log into a stored record.
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    /// A chain-context field the record identity depends on is absent.
    ///
    /// Raised by [`crate::events::decode`]; the mapper itself never
    /// produces it.
    #[error("malformed event: missing {field}")]
    MalformedEvent {
        /// Name of the missing log field.
        field: &'static str,
    },

    /// The log carried a known topic but its payload did not decode.
    #[error("failed to decode {event} log: {source}")]
    Decode {
        /// Event name matched by topic0.
        event: &'static str,
        /// Underlying ABI error.
        #[source]
        source: alloy::sol_types::Error,
    },

    /// The record store rejected or could not complete an upsert.
    #[error("record store unavailable: {0}")]
    StoreUnavailable(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IngestError {
    /// Wrap any store-side failure as [`IngestError::StoreUnavailable`].
    pub fn store(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::StoreUnavailable(err.into())
    }
}

/// Convenience alias used throughout the crate.
pub type Result<T, E = IngestError> = std::result::Result<T, E>;
