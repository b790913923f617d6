//! Error types for cadence-player
//!
//! Every command either returns a value or fails with a [`PlayerError`].
//! Errors carry a numeric code and a details map so a transport can forward
//! them unchanged.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::engine::{EngineError, EngineErrorKind};

/// Code reported when a pending load is superseded or the player is disposed mid-load
pub const ERROR_ABORT: i32 = 10_000_000;
pub const ERROR_UNSUPPORTED_SOURCE_TYPE: i32 = 10_000_001;
pub const ERROR_UNSUPPORTED_EFFECT_TYPE: i32 = 10_000_002;
pub const ERROR_EFFECT_NOT_CONFIGURED: i32 = 10_000_003;
pub const ERROR_INVALID_ARGUMENT: i32 = 10_000_004;
pub const ERROR_ILLEGAL_STATE: i32 = 10_000_005;
pub const ERROR_DISPOSED: i32 = 10_000_006;

/// Extra structured context attached to an error
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorDetails {
    /// Item index current when an engine error was raised
    pub index: Option<usize>,
}

/// Main error type for cadence-player
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// A pending load was superseded by a newer load or by dispose
    #[error("Connection aborted")]
    AbortedConnection,

    /// The engine failed to load or read media
    #[error("Source error: {message}")]
    EngineSource { message: String, index: Option<usize> },

    /// The engine failed while rendering
    #[error("Renderer error: {message}")]
    EngineRenderer { message: String, index: Option<usize> },

    /// The engine hit an unexpected internal failure
    #[error("Unexpected engine error: {message}")]
    EngineUnexpected { message: String, index: Option<usize> },

    /// Engine error outside the three well-known categories
    #[error("Engine error {code}: {message}")]
    EngineOther { code: i32, message: String, index: Option<usize> },

    /// Audio source descriptor carried an unknown `type`
    #[error("Unsupported audio source type: {0}")]
    UnsupportedSourceType(String),

    /// Effect descriptor carried an unknown `type`
    #[error("Unsupported audio effect type: {0}")]
    UnsupportedEffectType(String),

    /// Effect operation addressed an effect that is not instantiated
    #[error("Audio effect not configured: {0}")]
    EffectNotConfigured(String),

    /// Malformed command arguments
    #[error("Invalid argument: {0}")]
    InvalidCommandArgument(String),

    /// The engine rejected a synchronous call
    #[error("Illegal state: {0}")]
    IllegalState(String),

    /// Command issued after the player was disposed
    #[error("Player disposed")]
    Disposed,
}

impl PlayerError {
    /// Build the host-facing error for an engine failure
    pub fn from_engine(error: EngineError, index: Option<usize>) -> Self {
        let message = error.message;
        match error.kind {
            EngineErrorKind::Source => PlayerError::EngineSource { message, index },
            EngineErrorKind::Renderer => PlayerError::EngineRenderer { message, index },
            EngineErrorKind::Unexpected => PlayerError::EngineUnexpected { message, index },
            EngineErrorKind::Other(code) => PlayerError::EngineOther { code, message, index },
            EngineErrorKind::Rejected => PlayerError::IllegalState(message),
        }
    }

    /// Numeric error code
    pub fn code(&self) -> i32 {
        match self {
            PlayerError::AbortedConnection => ERROR_ABORT,
            PlayerError::EngineSource { .. } => EngineErrorKind::Source.code(),
            PlayerError::EngineRenderer { .. } => EngineErrorKind::Renderer.code(),
            PlayerError::EngineUnexpected { .. } => EngineErrorKind::Unexpected.code(),
            PlayerError::EngineOther { code, .. } => *code,
            PlayerError::UnsupportedSourceType(_) => ERROR_UNSUPPORTED_SOURCE_TYPE,
            PlayerError::UnsupportedEffectType(_) => ERROR_UNSUPPORTED_EFFECT_TYPE,
            PlayerError::EffectNotConfigured(_) => ERROR_EFFECT_NOT_CONFIGURED,
            PlayerError::InvalidCommandArgument(_) => ERROR_INVALID_ARGUMENT,
            PlayerError::IllegalState(_) => ERROR_ILLEGAL_STATE,
            PlayerError::Disposed => ERROR_DISPOSED,
        }
    }

    /// Structured details (the current index for engine-originated errors)
    pub fn details(&self) -> ErrorDetails {
        let index = match self {
            PlayerError::EngineSource { index, .. }
            | PlayerError::EngineRenderer { index, .. }
            | PlayerError::EngineUnexpected { index, .. }
            | PlayerError::EngineOther { index, .. } => *index,
            _ => None,
        };
        ErrorDetails { index }
    }


    /// Message without the category prefix, as latched into snapshots
    pub fn message(&self) -> String {
        match self {
            PlayerError::EngineSource { message, .. }
            | PlayerError::EngineRenderer { message, .. }
            | PlayerError::EngineUnexpected { message, .. }
            | PlayerError::EngineOther { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<serde_json::Error> for PlayerError {
    fn from(e: serde_json::Error) -> Self {
        PlayerError::InvalidCommandArgument(e.to_string())
    }
}

/// Convenience Result type using cadence-player's error
pub type Result<T> = std::result::Result<T, PlayerError>;
