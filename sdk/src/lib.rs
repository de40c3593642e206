//! Parley SDK
//!
//! Shared library providing the types and contracts used by the conversation
//! engine and by the applications plugged into it.

/// Error types and handling
pub mod errors;

/// Application handler trait
pub mod handler;

/// Session, context and entity types
pub mod types;

// Re-export commonly used types
pub use errors::{EngineError, ParleyErrorExt};
pub use handler::{Handler, HandlerResult};
pub use types::{Context, Entity, EntityMap, EntityValue, InputRecord, Session, SessionId};
