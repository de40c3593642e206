//! Error types and handling
//!
//! This module provides the error type shared by the conversation engine,
//! its input sources, and application handlers. All errors implement the
//! `ParleyErrorExt` trait which provides user-friendly hints and indicates
//! whether an error can be recovered from by waiting and trying again.
//!
//! # Propagation
//!
//! Transport, decode, status, and handler errors raised inside a conversation
//! turn abort that turn and stop the driver. `RateLimited` is the one error
//! input sources recover from locally; it never reaches the engine.

use std::time::SystemTime;
use thiserror::Error;

/// Trait for Parley error extensions
pub trait ParleyErrorExt {
    /// Returns a user-friendly hint for the error
    ///
    /// The hint is safe to display to end users and never includes tokens,
    /// raw response bodies, or session context.
    fn user_hint(&self) -> &str;

    /// Returns whether the error is recoverable
    ///
    /// Only throttling is recoverable: waiting for the window to reset is
    /// enough. Everything else ends the turn and needs the operator.
    fn is_recoverable(&self) -> bool;
}

/// Main engine error type
///
/// # Error Categories
///
/// - **Transport**: the request never produced a response
/// - **Decode**: a response arrived but its body could not be understood
/// - **ResponseStatus**: the service answered with a non-success status
/// - **RateLimited**: the upstream asked us to slow down until `reset`
/// - **Handler**: an application callback refused to continue
///
/// # Examples
///
/// ```
/// use sdk::errors::{EngineError, ParleyErrorExt};
///
/// let error = EngineError::MissingEntities("location".to_string());
/// assert_eq!(error.to_string(), "No entities associated with key location");
/// assert!(!error.is_recoverable());
///
/// let throttled = EngineError::RateLimited {
///     reset: std::time::SystemTime::now(),
/// };
/// assert!(throttled.is_recoverable());
/// ```
#[derive(Debug, Error)]
pub enum EngineError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    // Network errors
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Unable to handle response with code {code}: `{body}`")]
    ResponseStatus { code: u16, body: String },

    // Upstream throttling
    #[error("Rate limited until {reset:?}")]
    RateLimited { reset: SystemTime },

    // Application callback errors
    #[error("Handler error: {0}")]
    Handler(String),

    #[error("No entities associated with key {0}")]
    MissingEntities(String),

    // Conversation loop errors
    #[error("Conversation exceeded {0} turns without a stop directive")]
    MaxTurnsExceeded(usize),

    #[error("Invalid session id: {0}")]
    InvalidSessionId(String),
}

impl EngineError {
    /// Wrap any displayable application failure as a handler error
    pub fn handler(err: impl std::fmt::Display) -> Self {
        Self::Handler(err.to_string())
    }
}

impl ParleyErrorExt for EngineError {
    fn user_hint(&self) -> &str {
        match self {
            Self::Config(_) => "Check your config.toml file for errors",

            Self::Transport(_) => "Network operation failed. Check your connection",
            Self::Decode(_) => "The service sent a response that could not be understood",
            Self::ResponseStatus { .. } => {
                "The service rejected the request. Check your access token"
            }

            Self::RateLimited { .. } => "Rate limit exceeded. Please wait before trying again",

            Self::Handler(_) => "The application could not handle the conversation",
            Self::MissingEntities(_) => "The message did not contain the expected details",

            Self::MaxTurnsExceeded(_) => {
                "The conversation did not settle. Check the NLU story for loops"
            }
            Self::InvalidSessionId(_) => "The session could not be matched to a recipient",
        }
    }

    fn is_recoverable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}
