//! NLU Backend Abstraction Layer
//!
//! The conversation engine talks to a natural-language-understanding service
//! through the `NluBackend` trait: one request per turn carrying the session
//! id, the query text and the session context, answered by a raw directive
//! body. Decoding that body into a `Directive` happens in `directive`, so a
//! transport failure and a malformed payload stay distinguishable.

use async_trait::async_trait;
use sdk::errors::EngineError;
use sdk::types::{Context, SessionId};

pub mod client;
pub mod directive;

pub use client::NluClient;
pub use directive::{Directive, DirectiveKind};

/// Result type for NLU operations
pub type Result<T> = std::result::Result<T, NluError>;

/// Errors that can occur while talking to the NLU service
#[derive(Debug, thiserror::Error)]
pub enum NluError {
    #[error("Network error: {0}")]
    NetworkError(String),

    #[error("Timeout")]
    Timeout,

    #[error("Unable to handle response with code {code}: `{body}`")]
    Status { code: u16, body: String },

    #[error("Parse error: {0}")]
    ParseError(String),
}

impl From<NluError> for EngineError {
    fn from(err: NluError) -> Self {
        match err {
            NluError::NetworkError(msg) => EngineError::Transport(msg),
            NluError::Timeout => EngineError::Transport("NLU request timed out".to_string()),
            NluError::Status { code, body } => EngineError::ResponseStatus { code, body },
            NluError::ParseError(msg) => EngineError::Decode(msg),
        }
    }
}

/// NLU backend trait that every service binding implements
#[async_trait]
pub trait NluBackend: Send + Sync {
    /// Returns the name of the backend (e.g., "wit")
    fn name(&self) -> &str;

    /// Ask the backend what to do next in a conversation
    ///
    /// # Arguments
    /// * `session_id` - Conversation the turn belongs to
    /// * `query` - New user text; empty to let the backend keep talking
    /// * `context` - Session state the backend reasons over
    ///
    /// # Returns
    /// * `Ok(String)` - Raw response body, to be parsed with `directive::parse`
    /// * `Err(NluError)` - Transport failure or non-success status
    async fn converse(
        &self,
        session_id: &SessionId,
        query: &str,
        context: &Context,
    ) -> Result<String>;
}
