//! Error types for the streaming player
//!
//! Only construction and API misuse are reported through [`Result`]. Everything
//! that goes wrong while playing ends up in [`PlayerState::Failed`] instead.
//!
//! [`PlayerState::Failed`]: crate::types::PlayerState::Failed

use thiserror::Error;

/// Synchronous errors returned by the player API
#[derive(Debug, Error)]
pub enum PlaybackError {
    /// An item was built without any quality tier
    #[error("Audio item has no playable source")]
    NoSources,

    /// Index out of bounds
    #[error("Index out of bounds: {0}")]
    IndexOutOfBounds(usize),

    /// Queue is empty
    #[error("Queue is empty")]
    QueueEmpty,

    /// No item is currently loaded
    #[error("No item loaded")]
    NoItemLoaded,

    /// Configuration could not be loaded
    #[error("Configuration error: {0}")]
    Config(String),

    /// The player service is no longer running
    #[error("Player service stopped")]
    ServiceStopped,
}

/// Result type for player operations
pub type Result<T> = std::result::Result<T, PlaybackError>;

/// Failure reported by a decoder session
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecoderError {
    /// The source could not be opened
    #[error("Failed to open source: {0}")]
    Open(String),

    /// The transport failed while streaming
    #[error("Network failure: {0}")]
    Network(String),

    /// The stream could not be decoded
    #[error("Decode failure: {0}")]
    Decode(String),

    /// Anything else the decoder reports
    #[error("Decoder error: {0}")]
    Other(String),
}

impl DecoderError {
    /// Whether the failure is caused by missing connectivity
    pub fn is_connectivity_related(&self) -> bool {
        matches!(self, DecoderError::Network(_))
    }
}

/// Why an item stopped before reaching its natural end
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EndedError {
    /// The decoder reached end of media before the reported duration
    #[error("Item ended before its duration was reached")]
    ItemEndedEarly,

    /// The decoder failed
    #[error(transparent)]
    Decoder(#[from] DecoderError),
}

impl EndedError {
    /// Whether the failure is likely to clear up once connectivity returns
    pub fn is_connectivity_related(&self) -> bool {
        match self {
            EndedError::ItemEndedEarly => true,
            EndedError::Decoder(error) => error.is_connectivity_related(),
        }
    }
}

/// Reason carried by a failed player state
///
/// Two reasons compare equal when they are of the same kind; the wrapped
/// decoder error is not part of the comparison.
#[derive(Debug, Clone, Error)]
pub enum FailureReason {
    /// The retry budget was used up
    #[error("Maximum retry count hit")]
    MaximumRetryCountHit,

    /// The decoder reported an unrecoverable error
    #[error("Underlying decoder error: {0}")]
    UnderlyingDecoderError(EndedError),
}

impl PartialEq for FailureReason {
    fn eq(&self, other: &Self) -> bool {
        std::mem::discriminant(self) == std::mem::discriminant(other)
    }
}

impl Eq for FailureReason {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failure_reasons_compare_by_kind() {
        let a = FailureReason::UnderlyingDecoderError(EndedError::ItemEndedEarly);
        let b = FailureReason::UnderlyingDecoderError(EndedError::Decoder(
            DecoderError::Decode("bad frame".into()),
        ));
        assert_eq!(a, b);
        assert_ne!(a, FailureReason::MaximumRetryCountHit);
    }

    #[test]
    fn connectivity_classification() {
        assert!(EndedError::ItemEndedEarly.is_connectivity_related());
        assert!(EndedError::from(DecoderError::Network("reset".into())).is_connectivity_related());
        assert!(!EndedError::from(DecoderError::Open("404".into())).is_connectivity_related());
    }

    #[test]
    fn error_messages() {
        assert_eq!(
            PlaybackError::IndexOutOfBounds(4).to_string(),
            "Index out of bounds: 4"
        );
        assert_eq!(
            FailureReason::MaximumRetryCountHit.to_string(),
            "Maximum retry count hit"
        );
    }
}
