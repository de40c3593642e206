//! Feed session ids
//!
//! Every inbound message starts a fresh session named
//! `"<user id>-<unix seconds>"`, so replies can be routed back to the sender
//! from the session id alone.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use sdk::errors::EngineError;
use sdk::types::SessionId;

fn unix_secs(now: SystemTime) -> u64 {
    now.duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

fn stamped(user_id: i64, secs: u64) -> SessionId {
    SessionId::new(format!("{}-{}", user_id, secs))
}

/// Hands out session ids that are never reused within one connector
///
/// Two messages from the same user inside one second would otherwise share
/// an id, and the second could be queued before the first is acknowledged.
/// Such collisions are pushed to the next free second.
#[derive(Debug, Default)]
pub struct SessionIdAllocator {
    last_stamp: HashMap<i64, u64>,
}

impl SessionIdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate_at(&mut self, user_id: i64, now: SystemTime) -> SessionId {
        let secs = unix_secs(now);
        let stamp = match self.last_stamp.get(&user_id) {
            Some(&last) if last >= secs => last + 1,
            _ => secs,
        };
        self.last_stamp.insert(user_id, stamp);
        stamped(user_id, stamp)
    }

    pub fn allocate(&mut self, user_id: i64) -> SessionId {
        self.allocate_at(user_id, SystemTime::now())
    }
}

/// Recover the user id from a session id
///
/// Only the text before the first `-` is considered.
pub fn parse_session_id(session_id: &SessionId) -> Result<i64, EngineError> {
    let raw = session_id.as_str();
    let user = raw.split('-').next().unwrap_or_default();

    user.parse::<i64>()
        .map_err(|e| EngineError::InvalidSessionId(format!("{}: {}", raw, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_allocated_id_format() {
        let now = UNIX_EPOCH + Duration::from_secs(1_460_000_000);
        let mut ids = SessionIdAllocator::new();
        assert_eq!(ids.allocate_at(42, now).as_str(), "42-1460000000");
    }

    #[test]
    fn test_parse_recovers_user_id() {
        let mut ids = SessionIdAllocator::new();
        assert_eq!(parse_session_id(&ids.allocate(12345)).unwrap(), 12345);
        assert_eq!(
            parse_session_id(&SessionId::from("7-1460000000-extra")).unwrap(),
            7
        );
    }

    #[test]
    fn test_allocator_never_reuses_an_id() {
        let now = UNIX_EPOCH + Duration::from_secs(1_460_000_000);
        let mut ids = SessionIdAllocator::new();

        assert_eq!(ids.allocate_at(7, now).as_str(), "7-1460000000");
        assert_eq!(ids.allocate_at(7, now).as_str(), "7-1460000001");
        assert_eq!(ids.allocate_at(8, now).as_str(), "8-1460000000");

        let later = now + Duration::from_secs(60);
        assert_eq!(ids.allocate_at(7, later).as_str(), "7-1460000060");
        assert_eq!(parse_session_id(&ids.allocate(7)).unwrap(), 7);
    }

    #[test]
    fn test_parse_rejects_non_numeric_prefix() {
        for raw in ["interactive", "", "-123", "abc-123"] {
            let err = parse_session_id(&SessionId::from(raw)).unwrap_err();
            assert!(
                matches!(err, EngineError::InvalidSessionId(_)),
                "raw: {:?}",
                raw
            );
        }
    }
}
