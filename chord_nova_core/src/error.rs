// Error taxonomy for engine operations.
//
// Every fallible engine entry point returns `Result<_, EngineError>`. The
// protocol crate turns these into the `{error, category}` response variant,
// so the `category()` strings are part of the wire contract and must not
// change.
//
// "Nothing matched" is not an error: an exhausted search returns an empty
// candidate list together with `total_evaluated`.

use thiserror::Error;

/// Domain errors raised by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EngineError {
    /// Empty pitch list or a pitch outside 0..=127.
    #[error("invalid chord: {reason}")]
    InvalidChord { reason: String },

    /// A hard incompatibility in a configuration document.
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },

    /// No voice pairing fits the configured alignment window.
    #[error(
        "incompatible alignment: no pairing of {ante_len} voices onto {post_len} voices \
         fits the index window [{i_min}, {i_max}]"
    )]
    IncompatibleAlignment {
        ante_len: usize,
        post_len: usize,
        i_min: usize,
        i_max: usize,
    },
}

impl EngineError {
    pub fn invalid_chord(reason: impl Into<String>) -> Self {
        EngineError::InvalidChord {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        EngineError::InvalidConfig {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable category, used as the `category` field of
    /// error responses.
    pub fn category(&self) -> &'static str {
        match self {
            EngineError::InvalidChord { .. } => "invalid_chord",
            EngineError::InvalidConfig { .. } => "invalid_config",
            EngineError::IncompatibleAlignment { .. } => "incompatible_alignment",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_categories_are_stable() {
        assert_eq!(EngineError::invalid_chord("x").category(), "invalid_chord");
        assert_eq!(EngineError::invalid_config("x").category(), "invalid_config");
        let err = EngineError::IncompatibleAlignment {
            ante_len: 3,
            post_len: 5,
            i_min: 0,
            i_max: 1,
        };
        assert_eq!(err.category(), "incompatible_alignment");
    }

    #[test]
    fn test_messages_name_the_problem() {
        let err = EngineError::invalid_chord("pitch 130 is outside 0..=127");
        assert_eq!(err.to_string(), "invalid chord: pitch 130 is outside 0..=127");
    }
}
