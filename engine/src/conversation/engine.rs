//! Conversation Engine
//!
//! Drives a single session through the NLU directive loop:
//!
//! 1. Call the backend with the session id, the query and the context
//! 2. Parse the response body into a `Directive`
//! 3. Dispatch non-terminal directives to the handler
//! 4. Repeat with an empty query until `Stop` or `Unknown`
//!
//! The first call carries the user's query; every follow-up call sends an
//! empty query so the backend can keep talking. Any error aborts the turn.

use std::sync::Arc;
use tracing::{debug, error, info};

use sdk::errors::EngineError;
use sdk::handler::Handler;
use sdk::types::Session;

use crate::nlu::directive::{self, Directive};
use crate::nlu::NluBackend;

/// Default cap on backend calls per `advance`
pub const DEFAULT_MAX_TURNS: usize = 25;

/// Conversation engine that pairs an NLU backend with an application handler
pub struct ConversationEngine {
    backend: Arc<dyn NluBackend>,
    handler: Arc<dyn Handler>,

    /// Maximum backend calls per `advance`; 0 means unbounded
    max_turns: usize,
}

impl ConversationEngine {
    pub fn new(backend: Arc<dyn NluBackend>, handler: Arc<dyn Handler>) -> Self {
        Self {
            backend,
            handler,
            max_turns: DEFAULT_MAX_TURNS,
        }
    }

    /// Override the per-query turn cap (0 disables it)
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns;
        self
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }

    /// Run the directive loop for one query and return the updated session
    ///
    /// Terminates when the backend answers `stop` (or an unrecognised type).
    /// Transport, status, decode and handler errors propagate unchanged and
    /// leave the caller without a session; the context is not rolled back.
    pub async fn advance(&self, mut session: Session, query: &str) -> Result<Session, EngineError> {
        let mut query = query;
        let mut turn = 0;

        info!(
            "Advancing session {} via {} backend",
            session.id(),
            self.backend.name()
        );

        loop {
            if self.max_turns != 0 && turn >= self.max_turns {
                error!(
                    "Session {} exceeded max turns ({})",
                    session.id(),
                    self.max_turns
                );
                return Err(EngineError::MaxTurnsExceeded(self.max_turns));
            }
            turn += 1;

            let body = self
                .backend
                .converse(session.id(), query, &session.context)
                .await
                .map_err(|e| {
                    error!("Converse call for session {} failed: {}", session.id(), e);
                    EngineError::from(e)
                })?;

            let directive = directive::parse(&body).map_err(|e| {
                error!("Bad converse response for session {}: {}", session.id(), e);
                EngineError::from(e)
            })?;

            // Follow-up calls let the backend continue on its own
            query = "";

            debug!(
                "Session {} turn {}: {} directive",
                session.id(),
                turn,
                directive.kind()
            );

            session = match directive {
                Directive::Action(name) => self.handler.action(session, &name).await?,
                Directive::Message(text) => self.handler.say(session, &text).await?,
                Directive::Merge(entities) => self.handler.merge(session, &entities).await?,
                Directive::Stop | Directive::Unknown => {
                    debug!("Session {} settled after {} turns", session.id(), turn);
                    return Ok(session);
                }
            };
        }
    }
}
