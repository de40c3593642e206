//! Top-level driver loop
//!
//! Pulls one record at a time from an input source, runs it through the
//! conversation engine, and acknowledges the session id back to the source
//! so it may send that session's next record.

use tracing::{debug, error, info};

use sdk::errors::EngineError;

use super::engine::ConversationEngine;
use super::store::SessionStore;
use crate::input::InputSource;

/// Couples a conversation engine with the session store it feeds from
pub struct Driver {
    engine: ConversationEngine,
    store: SessionStore,
}

impl Driver {
    pub fn new(engine: ConversationEngine) -> Self {
        Self {
            engine,
            store: SessionStore::new(),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Process records until the source closes its record stream
    ///
    /// Returns the first engine error; the source is abandoned at that
    /// point and the failing session is not written back.
    pub async fn run<S: InputSource>(&mut self, source: S) -> Result<(), EngineError> {
        let (requests, mut records) = source.run();
        let mut processed = 0usize;

        while let Some(record) = records.recv().await {
            debug!(
                "Record for session {} ({} chars)",
                record.session_id,
                record.query.len()
            );

            let session = self.store.checkout(&record.session_id);
            let session = match self.engine.advance(session, &record.query).await {
                Ok(session) => session,
                Err(e) => {
                    error!("Session {} failed: {}", record.session_id, e);
                    return Err(e);
                }
            };
            self.store.insert(session);
            processed += 1;

            if requests.send(record.session_id).await.is_err() {
                debug!("Input source no longer accepts acknowledgements");
            }
        }

        info!(
            "Input closed after {} records across {} sessions",
            processed,
            self.store.len()
        );
        Ok(())
    }
}
