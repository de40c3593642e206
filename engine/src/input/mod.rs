//! Input sources
//!
//! An input source feeds the driver through a pair of channels:
//!
//! - a **record stream** of `InputRecord`s it produces, closed when the
//!   source is done;
//! - a **request sink** on which the driver acknowledges each processed
//!   record by sending back its session id.
//!
//! A source must not enqueue a second record for a session until it has
//! received the acknowledgement for the first one.

use tokio::sync::mpsc;

use sdk::types::{InputRecord, SessionId};

pub mod interactive;

pub use interactive::InteractiveInput;

/// Default capacity of the acknowledgement channel
pub const DEFAULT_ACK_BUFFER: usize = 16;

/// Something that produces queries for the driver
pub trait InputSource {
    /// Start the source's background tasks
    ///
    /// Must be called from within a Tokio runtime.
    fn run(self) -> (mpsc::Sender<SessionId>, mpsc::Receiver<InputRecord>);
}
