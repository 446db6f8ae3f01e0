use thiserror::Error;

/// Errors that can occur while recognizing, initializing, rendering, or seeking a stream.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StreamError {
    #[error("unrecognized format: {0}")]
    UnrecognizedFormat(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Malformed or truncated codec data. `samples_done` frames of the failing
    /// render call were completed and are valid output.
    #[error("decode fault after {samples_done} samples: {reason}")]
    DecodeFault { samples_done: usize, reason: String },

    #[error("unseekable request: {0}")]
    UnseekableRequest(String),

    #[error("config conflict: {0}")]
    ConfigConflict(String),

    #[error("I/O error: {0}")]
    Io(String),
}

impl StreamError {
    pub fn decode_fault(reason: impl Into<String>) -> Self {
        Self::DecodeFault {
            samples_done: 0,
            reason: reason.into(),
        }
    }

    /// Rewrites the partial count of a `DecodeFault`; other variants pass through.
    pub fn with_samples_done(self, samples_done: usize) -> Self {
        match self {
            Self::DecodeFault { reason, .. } => Self::DecodeFault { samples_done, reason },
            other => other,
        }
    }

    /// Adds `earlier` frames completed before the faulting call to a
    /// `DecodeFault`'s partial count.
    pub fn after_samples(self, earlier: usize) -> Self {
        match self {
            Self::DecodeFault { samples_done, reason } => Self::DecodeFault {
                samples_done: samples_done + earlier,
                reason,
            },
            other => other,
        }
    }

    pub fn is_decode_fault(&self) -> bool {
        matches!(self, Self::DecodeFault { .. })
    }

    /// Frames written before a `DecodeFault`; 0 for every other error.
    pub fn samples_done(&self) -> usize {
        match self {
            Self::DecodeFault { samples_done, .. } => *samples_done,
            _ => 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_samples_done_only_touches_decode_faults() {
        let fault = StreamError::decode_fault("short read").with_samples_done(42);
        assert_eq!(
            fault,
            StreamError::DecodeFault {
                samples_done: 42,
                reason: "short read".into()
            }
        );

        let conflict = StreamError::ConfigConflict("x".into()).with_samples_done(3);
        assert_eq!(conflict, StreamError::ConfigConflict("x".into()));
    }

    #[test]
    fn after_samples_accumulates() {
        let fault = StreamError::decode_fault("eof").after_samples(10).after_samples(5);
        assert!(matches!(fault, StreamError::DecodeFault { samples_done: 15, .. }));
        assert_eq!(StreamError::Io("x".into()).after_samples(5), StreamError::Io("x".into()));
        assert_eq!(fault.samples_done(), 15);
        assert_eq!(StreamError::Io("x".into()).samples_done(), 0);
    }

    #[test]
    fn display_includes_partial_count() {
        let fault = StreamError::decode_fault("bad frame").with_samples_done(7);
        assert_eq!(fault.to_string(), "decode fault after 7 samples: bad frame");
    }
}
