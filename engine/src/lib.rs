//! Parley Engine Library
//!
//! This library provides the session-driven conversation engine, its input
//! sources, and the example applications. It is used by both the main binary
//! and integration tests.

/// Configuration management module
pub mod config;

/// NLU backend abstraction and Wit.ai client
pub mod nlu;

/// Conversation engine, session store and driver loop
pub mod conversation;

/// Input source contract and interactive input
pub mod input;

/// Polling direct-message connector with rate-limit backoff
pub mod connector;

/// Telemetry and Observability
pub mod telemetry;

/// CLI interface module
pub mod cli;

/// Example applications and command handlers
pub mod handlers;
