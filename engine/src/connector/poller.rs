//! Feed connector
//!
//! `FeedConnector::run` starts three tasks:
//!
//! - **drain**: discards driver acknowledgements; feed sessions are
//!   single-shot so nothing waits on them
//! - **fetch loop**: polls the feed on a fixed interval, emits unseen
//!   messages in ascending id order, and advances the processed-to marker
//! - **write loop**: delivers outgoing replies queued by the handler
//!
//! Both loops sleep through rate-limit windows and retry the same call.
//! A fetch failure of any other kind stops the fetch loop, is published on
//! `fetch_failure()`, and closes the record stream; a send failure of any
//! other kind drops that one reply.

use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use sdk::types::{InputRecord, SessionId};

use super::backoff::{rate_limit_wait, DEFAULT_MIN_WAIT};
use super::session_id::SessionIdAllocator;
use super::{DirectMessage, FeedApi, FeedError, Result};
use crate::config::FeedConfig;
use crate::input::{InputSource, DEFAULT_ACK_BUFFER};

/// Reply queued for delivery to a feed user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub user_id: i64,
    pub text: String,
}

/// Connector tuning
#[derive(Debug, Clone)]
pub struct FeedSettings {
    /// Time between fetch cycles
    pub poll_interval: Duration,

    /// Lower bound on every rate-limit wait
    pub min_wait: Duration,

    /// Messages requested per fetch
    pub fetch_limit: usize,

    /// Capacity of the outgoing reply queue
    pub outgoing_buffer: usize,

    /// Capacity of the acknowledgement channel
    pub ack_buffer: usize,
}

impl Default for FeedSettings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(60),
            min_wait: DEFAULT_MIN_WAIT,
            fetch_limit: 100,
            outgoing_buffer: 10,
            ack_buffer: DEFAULT_ACK_BUFFER,
        }
    }
}

impl FeedSettings {
    pub fn from_config(config: &FeedConfig, ack_buffer: usize) -> Self {
        Self {
            poll_interval: Duration::from_secs(config.poll_interval_secs),
            min_wait: Duration::from_secs(config.min_wait_secs),
            fetch_limit: config.fetch_limit,
            outgoing_buffer: config.outgoing_buffer,
            ack_buffer,
        }
    }
}

/// Polling input source over a `FeedApi`
pub struct FeedConnector {
    api: Arc<dyn FeedApi>,
    settings: FeedSettings,

    /// Highest message id already turned into a record
    processed_to: i64,
    marker: watch::Sender<i64>,

    /// Error that stopped the fetch loop, if any
    failure: watch::Sender<Option<FeedError>>,

    session_ids: SessionIdAllocator,

    outgoing_tx: mpsc::Sender<OutgoingMessage>,

    /// Taken by the write loop on `spawn_writer` or `run`
    outgoing_rx: Option<mpsc::Receiver<OutgoingMessage>>,
}

impl FeedConnector {
    pub fn new(api: Arc<dyn FeedApi>, settings: FeedSettings) -> Self {
        let (outgoing_tx, outgoing_rx) = mpsc::channel(settings.outgoing_buffer.max(1));
        let (marker, _) = watch::channel(0);
        let (failure, _) = watch::channel(None);

        Self {
            api,
            settings,
            processed_to: 0,
            marker,
            failure,
            session_ids: SessionIdAllocator::new(),
            outgoing_tx,
            outgoing_rx: Some(outgoing_rx),
        }
    }

    /// Queue handle for replies; the write loop runs until every handle is dropped
    pub fn outbox(&self) -> mpsc::Sender<OutgoingMessage> {
        self.outgoing_tx.clone()
    }

    /// Subscribe to processed-to marker updates
    pub fn processed_marker(&self) -> watch::Receiver<i64> {
        self.marker.subscribe()
    }

    /// Subscribe to the error that ends the fetch loop
    ///
    /// Stays `None` when the loop stops because the record stream was
    /// dropped.
    pub fn fetch_failure(&self) -> watch::Receiver<Option<FeedError>> {
        self.failure.subscribe()
    }

    /// Start the write loop now and hand back its task
    ///
    /// The loop ends once every outbox handle (including the connector's own)
    /// is dropped and the queue is drained. Returns `None` if the loop was
    /// already started.
    pub fn spawn_writer(&mut self) -> Option<JoinHandle<()>> {
        let outgoing = self.outgoing_rx.take()?;
        Some(tokio::spawn(run_write_loop(
            Arc::clone(&self.api),
            outgoing,
            self.settings.min_wait,
        )))
    }

    pub fn processed_to(&self) -> i64 {
        self.processed_to
    }

    /// Resume after a known message id
    pub fn set_processed_marker(&mut self, id: i64) {
        self.processed_to = id;
        self.marker.send_replace(id);
    }

    /// Skip everything already in the feed
    ///
    /// Fetches the most recent message and marks it processed. An empty feed
    /// leaves the marker untouched.
    pub async fn set_processed_marker_to_current(&mut self) -> Result<i64> {
        let latest = fetch_with_backoff(self.api.as_ref(), 0, 1, self.settings.min_wait).await?;

        if let Some(id) = latest.iter().map(|m| m.id).max() {
            self.set_processed_marker(id);
        }
        Ok(self.processed_to)
    }

    /// Run one fetch cycle, emitting every unseen message
    ///
    /// Returns how many records were emitted. Rate limits are waited out;
    /// any other feed error is returned. Stops early if `records` is closed.
    pub async fn poll_once(&mut self, records: &mpsc::Sender<InputRecord>) -> Result<usize> {
        info!("Requesting direct messages since {}", self.processed_to);
        let mut messages = fetch_with_backoff(
            self.api.as_ref(),
            self.processed_to,
            self.settings.fetch_limit,
            self.settings.min_wait,
        )
        .await?;
        info!("Got {} messages", messages.len());

        messages.sort_by_key(|m| m.id);

        let mut emitted = 0;
        for message in messages {
            if message.id <= self.processed_to {
                continue;
            }

            let record = self.record_for(message.sender.id, message.text);
            if records.send(record).await.is_err() {
                debug!("Record stream closed, stopping fetch cycle");
                break;
            }
            self.set_processed_marker(message.id);
            emitted += 1;
        }

        Ok(emitted)
    }

    fn record_for(&mut self, user_id: i64, text: String) -> InputRecord {
        InputRecord::new(self.session_ids.allocate(user_id), text)
    }
}

/// Call `fetch_since`, sleeping through rate-limit windows
async fn fetch_with_backoff(
    api: &dyn FeedApi,
    since_id: i64,
    count: usize,
    min_wait: Duration,
) -> Result<Vec<DirectMessage>> {
    loop {
        match api.fetch_since(since_id, count).await {
            Err(FeedError::RateLimited { reset }) => {
                let wait = rate_limit_wait(reset, SystemTime::now(), min_wait);
                warn!(
                    reset = ?reset,
                    wait_secs = wait.as_secs_f64(),
                    "feed fetch rate limited, waiting"
                );
                tokio::time::sleep(wait).await;
            }
            other => return other,
        }
    }
}

/// Consume and discard driver acknowledgements
pub async fn drain_requests(mut requests: mpsc::Receiver<SessionId>) {
    while let Some(session_id) = requests.recv().await {
        debug!("Discarding request {}", session_id);
    }
}

/// Poll until a fatal error or until the record stream is dropped
async fn run_fetch_loop(mut connector: FeedConnector, records: mpsc::Sender<InputRecord>) {
    let mut ticker = tokio::time::interval(connector.settings.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = records.closed() => {
                debug!("Record stream dropped, stopping fetch loop");
                break;
            }
        }

        let polled = tokio::select! {
            result = connector.poll_once(&records) => result,
            _ = records.closed() => {
                debug!("Record stream dropped mid-poll, stopping fetch loop");
                break;
            }
        };

        if let Err(e) = polled {
            error!("Fetch loop stopped: {}", e);
            for line in e.report_lines() {
                error!("{}", line);
            }
            connector.failure.send_replace(Some(e));
            break;
        }
        debug!("Waiting for next poll interval");
    }
}

/// Deliver queued replies until every sender is dropped
///
/// Throttled sends are retried after the backoff wait for as long as it
/// takes; other failures drop the reply.
pub async fn run_write_loop(
    api: Arc<dyn FeedApi>,
    mut outgoing: mpsc::Receiver<OutgoingMessage>,
    min_wait: Duration,
) {
    while let Some(message) = outgoing.recv().await {
        loop {
            info!("Sending `{}` to user {}", message.text, message.user_id);
            match api.send(message.user_id, &message.text).await {
                Ok(()) => break,
                Err(FeedError::RateLimited { reset }) => {
                    let wait = rate_limit_wait(reset, SystemTime::now(), min_wait);
                    warn!(
                        user_id = message.user_id,
                        reset = ?reset,
                        wait_secs = wait.as_secs_f64(),
                        "feed send rate limited, retrying"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(e) => {
                    error!("{}, will not retry write", e);
                    break;
                }
            }
        }
    }
    debug!("Outgoing queue closed");
}

impl InputSource for FeedConnector {
    fn run(self) -> (mpsc::Sender<SessionId>, mpsc::Receiver<InputRecord>) {
        let (ack_tx, ack_rx) = mpsc::channel(self.settings.ack_buffer.max(1));
        let (record_tx, record_rx) = mpsc::channel(1);

        let mut connector = self;
        tokio::spawn(drain_requests(ack_rx));
        // Detached unless the caller already took the handle
        let _ = connector.spawn_writer();
        tokio::spawn(run_fetch_loop(connector, record_tx));

        (ack_tx, record_rx)
    }
}
