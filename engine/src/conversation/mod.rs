//! Session-driven conversation engine
//!
//! The engine runs one session through the NLU directive loop, the store
//! keeps sessions between queries, and the driver ties both to an input
//! source.

pub mod driver;
pub mod engine;
pub mod store;

pub use driver::Driver;
pub use engine::{ConversationEngine, DEFAULT_MAX_TURNS};
pub use store::SessionStore;
