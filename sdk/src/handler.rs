//! Application handler trait
//!
//! The conversation engine calls into a `Handler` once per non-terminal
//! directive. Each callback receives the session by value and hands back
//! the session the engine should continue with, so a handler may mutate the
//! context in place or replace it outright.

use async_trait::async_trait;

use crate::errors::EngineError;
use crate::types::{EntityMap, Session};

/// Result of a handler callback
pub type HandlerResult = Result<Session, EngineError>;

/// Trait that every conversation application implements
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run the named action, typically deriving new facts into the context
    async fn action(&self, session: Session, action: &str) -> HandlerResult;

    /// Relay a message to the end user
    async fn say(&self, session: Session, message: &str) -> HandlerResult;

    /// Fold extracted entities into the context
    ///
    /// What to do when an expected entity is missing is up to the handler.
    async fn merge(&self, session: Session, entities: &EntityMap) -> HandlerResult;

    /// Surface a non-fatal, user-facing problem
    ///
    /// Fire-and-forget. The engine never calls this itself; applications do
    /// when they want to tell a user something went wrong.
    async fn error(&self, session: &Session, message: &str);
}
