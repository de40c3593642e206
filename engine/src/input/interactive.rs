//! Interactive terminal input
//!
//! Reads one line per acknowledgement, prompting with the session id the
//! line will belong to. Every line goes to the single `interactive` session.
//! Typing `:quit` (any case) or closing stdin ends the record stream.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use sdk::types::{InputRecord, SessionId};

use super::{InputSource, DEFAULT_ACK_BUFFER};

/// Session id used for every interactive record
pub const INTERACTIVE_SESSION: &str = "interactive";

/// Line that ends an interactive session
pub const QUIT_SENTINEL: &str = ":quit";

/// Line-oriented input over any async reader/writer pair
pub struct InteractiveInput<R, W> {
    reader: R,
    prompt: W,
    ack_buffer: usize,
}

impl InteractiveInput<BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Read from stdin and prompt on stdout
    pub fn stdio() -> Self {
        Self::new(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
    }
}

impl<R, W> InteractiveInput<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(reader: R, prompt: W) -> Self {
        Self {
            reader,
            prompt,
            ack_buffer: DEFAULT_ACK_BUFFER,
        }
    }

    pub fn with_ack_buffer(mut self, ack_buffer: usize) -> Self {
        self.ack_buffer = ack_buffer.max(1);
        self
    }
}

/// True when `line` asks to end the session
fn is_quit(line: &str) -> bool {
    line.trim().eq_ignore_ascii_case(QUIT_SENTINEL)
}

async fn write_prompt<W: AsyncWrite + Unpin>(prompt: &mut W, text: &str) {
    let result = async {
        prompt.write_all(text.as_bytes()).await?;
        prompt.flush().await
    }
    .await;

    if let Err(e) = result {
        debug!("Failed to write prompt: {}", e);
    }
}

impl<R, W> InputSource for InteractiveInput<R, W>
where
    R: AsyncBufRead + Unpin + Send + 'static,
    W: AsyncWrite + Unpin + Send + 'static,
{
    fn run(self) -> (mpsc::Sender<SessionId>, mpsc::Receiver<InputRecord>) {
        let (ack_tx, mut ack_rx) = mpsc::channel::<SessionId>(self.ack_buffer);
        let (record_tx, record_rx) = mpsc::channel::<InputRecord>(1);

        // Prime the loop so the first prompt appears without a driver round trip
        if ack_tx
            .try_send(SessionId::from(INTERACTIVE_SESSION))
            .is_err()
        {
            warn!("Failed to queue the initial interactive request");
        }

        let Self {
            reader, mut prompt, ..
        } = self;

        tokio::spawn(async move {
            let mut lines = reader.lines();
            write_prompt(&mut prompt, "Interactive mode (use ':quit' to stop)\n").await;

            while let Some(session_id) = ack_rx.recv().await {
                write_prompt(&mut prompt, &format!("{}> ", session_id)).await;

                let line = match lines.next_line().await {
                    Ok(Some(line)) => line,
                    Ok(None) => {
                        debug!("Interactive input reached end of stream");
                        break;
                    }
                    Err(e) => {
                        warn!("Failed to read interactive input: {}", e);
                        break;
                    }
                };

                if is_quit(&line) {
                    debug!("Quit requested");
                    break;
                }

                if record_tx
                    .send(InputRecord::new(session_id, line))
                    .await
                    .is_err()
                {
                    debug!("Driver stopped consuming interactive records");
                    break;
                }
            }
        });

        (ack_tx, record_rx)
    }
}
