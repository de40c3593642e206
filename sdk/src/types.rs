//! Session and entity types
//!
//! These are the values that flow between input sources, the conversation
//! engine, and application handlers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;

use crate::errors::EngineError;

/// Opaque session identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session id from any string-like value
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SessionId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for SessionId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Conversational state exchanged with the NLU backend on every turn
///
/// Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Context(Map<String, Value>);

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a single key, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Look up a key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Look up a key holding a string
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(Value::as_str)
    }

    /// Copy every key of `other` into this context; `other` wins on conflicts
    pub fn merge(&mut self, other: Context) {
        self.0.extend(other.0);
    }

    /// Drop every key
    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Context {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// A conversation session
///
/// The id never changes once created. The context is owned by whoever holds
/// the session: the session store between turns, the engine and its handler
/// while a turn is running.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: SessionId,

    /// Mutable conversational state
    pub context: Context,
}

impl Session {
    /// Create a session with an empty context
    pub fn new(id: SessionId) -> Self {
        Self {
            id,
            context: Context::new(),
        }
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }
}

/// One query produced by an input source
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputRecord {
    pub session_id: SessionId,

    /// Query text; empty means "continue without new user input"
    pub query: String,
}

impl InputRecord {
    pub fn new(session_id: SessionId, query: impl Into<String>) -> Self {
        Self {
            session_id,
            query: query.into(),
        }
    }
}

/// Alternative value of an entity with the expressions that map to it
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EntityValue {
    pub expressions: Vec<String>,
    pub value: String,
}

/// Candidate value extracted by the NLU backend
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Entity {
    pub lang: String,
    pub closed: bool,
    pub exotic: bool,
    pub value: String,
    pub values: Vec<EntityValue>,
    pub builtin: bool,
    pub doc: String,
    pub name: String,
    pub id: String,
}

impl Entity {
    /// Shorthand for an entity that only carries a value
    pub fn with_value(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            ..Self::default()
        }
    }
}

/// Entities keyed by semantic label, each list in backend order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntityMap(HashMap<String, Vec<Entity>>);

impl EntityMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a candidate for `key`
    pub fn push(&mut self, key: impl Into<String>, entity: Entity) {
        self.0.entry(key.into()).or_default().push(entity);
    }

    /// All candidates for `key`, in backend order
    pub fn get(&self, key: &str) -> Option<&[Entity]> {
        self.0.get(key).map(Vec::as_slice)
    }

    /// Value of the first candidate for `key`
    ///
    /// Index 0 is authoritative. Fails with `MissingEntities` when the key is
    /// absent or its list is empty.
    pub fn first_entity_value(&self, key: &str) -> Result<&str, EngineError> {
        self.0
            .get(key)
            .and_then(|entities| entities.first())
            .map(|entity| entity.value.as_str())
            .ok_or_else(|| EngineError::MissingEntities(key.to_string()))
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
