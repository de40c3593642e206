//! Example applications and command handlers
//!
//! This module implements the two example handlers plus the CLI commands
//! that wire them up:
//! - interactive: weather bot on the terminal
//! - feed: weather bot answering direct messages
//! - message: one-shot meaning extraction

use anyhow::{bail, Context as _, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::mpsc;

use sdk::errors::{EngineError, ParleyErrorExt};
use sdk::handler::{Handler, HandlerResult};
use sdk::types::{Context, EntityMap, Session};

use crate::config::{Config, Credentials};
use crate::connector::http::OAuthKeys;
use crate::connector::session_id::parse_session_id;
use crate::connector::{FeedConnector, FeedError, FeedSettings, HttpFeedClient, OutgoingMessage};
use crate::conversation::{ConversationEngine, Driver};
use crate::input::InteractiveInput;
use crate::nlu::NluClient;

/// `--processed-to` value meaning "start from the newest message"
pub const CURRENT_TIP: i64 = -1;

/// Record the (fixed) forecast for the requested location
fn fetch_forecast(mut session: Session) -> Session {
    session.context.set("forecast", "sunny");
    session
}

/// Remember the first `location` entity, or start over when there is none
fn merge_location(mut session: Session, entities: &EntityMap) -> Session {
    match entities.first_entity_value("location") {
        Ok(location) => {
            session
                .context
                .merge([("loc", location)].into_iter().collect::<Context>());
        }
        Err(e) => {
            tracing::debug!("Resetting context for {}: {}", session.id(), e);
            session.context.clear();
        }
    }
    session
}

/// Weather bot that talks on stdout
#[derive(Debug, Default)]
pub struct WeatherHandler;

#[async_trait]
impl Handler for WeatherHandler {
    async fn action(&self, session: Session, action: &str) -> HandlerResult {
        tracing::debug!("Action '{}' for {}", action, session.id());
        Ok(fetch_forecast(session))
    }

    async fn say(&self, session: Session, message: &str) -> HandlerResult {
        println!("< {}", message);
        Ok(session)
    }

    async fn merge(&self, session: Session, entities: &EntityMap) -> HandlerResult {
        Ok(merge_location(session, entities))
    }

    async fn error(&self, session: &Session, message: &str) {
        tracing::warn!("Session {}: {}", session.id(), message);
    }
}

/// Weather bot that replies through the feed connector's outgoing queue
#[derive(Debug, Clone)]
pub struct FeedHandler {
    outbox: mpsc::Sender<OutgoingMessage>,
}

impl FeedHandler {
    pub fn new(outbox: mpsc::Sender<OutgoingMessage>) -> Self {
        Self { outbox }
    }
}

#[async_trait]
impl Handler for FeedHandler {
    async fn action(&self, session: Session, _action: &str) -> HandlerResult {
        Ok(fetch_forecast(session))
    }

    /// Queue the reply for the user encoded in the session id
    ///
    /// Waits while the outgoing queue is full.
    async fn say(&self, session: Session, message: &str) -> HandlerResult {
        let user_id = parse_session_id(session.id())?;

        self.outbox
            .send(OutgoingMessage {
                user_id,
                text: message.to_string(),
            })
            .await
            .map_err(|_| EngineError::handler("outgoing message queue is closed"))?;

        Ok(session)
    }

    async fn merge(&self, session: Session, entities: &EntityMap) -> HandlerResult {
        Ok(merge_location(session, entities))
    }

    async fn error(&self, session: &Session, message: &str) {
        tracing::warn!("Session {}: {}", session.id(), message);
    }
}

/// Run the weather bot on the terminal
pub async fn handle_interactive(token: String, debug: bool, config: &Config) -> Result<()> {
    let nlu = NluClient::new(&config.nlu, token).with_debug(debug);
    let engine = ConversationEngine::new(Arc::new(nlu), Arc::new(WeatherHandler))
        .with_max_turns(config.engine.max_turns);

    let input = InteractiveInput::stdio().with_ack_buffer(config.engine.ack_buffer);

    Driver::new(engine)
        .run(input)
        .await
        .context("Conversation failed")?;

    Ok(())
}

/// Print one line per upstream error, the way operators expect to read them
fn report_feed_error(err: &FeedError) {
    for line in err.report_lines() {
        eprintln!("{}", line);
    }
}

/// Answer direct messages until the feed fails
pub async fn handle_feed(
    credentials_path: &Path,
    processed_to: i64,
    debug: bool,
    config: &Config,
) -> Result<()> {
    if processed_to < CURRENT_TIP {
        bail!(
            "--processed-to must be a message id or {}, got {}",
            CURRENT_TIP,
            processed_to
        );
    }

    let credentials = Credentials::load(credentials_path)?;

    let feed = HttpFeedClient::new(&config.feed, OAuthKeys::from(&credentials)).with_debug(debug);
    let mut connector = FeedConnector::new(
        Arc::new(feed),
        FeedSettings::from_config(&config.feed, config.engine.ack_buffer),
    );

    if processed_to == CURRENT_TIP {
        if let Err(e) = connector.set_processed_marker_to_current().await {
            report_feed_error(&e);
            return Err(anyhow::Error::new(EngineError::from(e))
                .context("Failed to find the newest direct message"));
        }
    } else {
        connector.set_processed_marker(processed_to);
    }
    println!("Processed to: {}", connector.processed_to());

    let marker = connector.processed_marker();
    let failure = connector.fetch_failure();
    let writer = connector.spawn_writer();

    let nlu = NluClient::new(&config.nlu, credentials.nlu_token.clone()).with_debug(debug);
    let handler = FeedHandler::new(connector.outbox());
    let engine = ConversationEngine::new(Arc::new(nlu), Arc::new(handler))
        .with_max_turns(config.engine.max_turns);

    // The driver owns the last outbox handles; dropping it lets the writer finish
    let result = Driver::new(engine).run(connector).await;

    if let Some(writer) = writer {
        tracing::debug!("Waiting for queued replies to be delivered");
        if let Err(e) = writer.await {
            tracing::warn!("Write loop ended abnormally: {}", e);
        }
    }

    let last = *marker.borrow();
    tracing::info!("Last processed message id: {}", last);
    println!("Processed to: {}", last);

    result.context("Conversation failed")?;

    let stopped_by = failure.borrow().clone();
    if let Some(e) = stopped_by {
        report_feed_error(&e);
        return Err(anyhow::Error::new(EngineError::from(e))
            .context("Direct message feed stopped"));
    }
    Ok(())
}

/// Operator-facing lines for an error that ends a command
///
/// The full cause chain first, then the hint of the engine error behind it.
pub fn fatal_diagnostic(err: &anyhow::Error) -> Vec<String> {
    let mut lines = vec![format!("Error: {:#}", err)];
    if let Some(engine_err) = err.chain().find_map(|e| e.downcast_ref::<EngineError>()) {
        lines.push(format!("Hint: {}", engine_err.user_hint()));
    }
    lines
}

/// Print the raw meaning-extraction response for `text`
pub async fn handle_message(token: String, text: &str, debug: bool, config: &Config) -> Result<()> {
    let nlu = NluClient::new(&config.nlu, token).with_debug(debug);

    let body = nlu
        .message(text)
        .await
        .map_err(EngineError::from)
        .context("Message request failed")?;

    println!("{}", body);
    Ok(())
}
