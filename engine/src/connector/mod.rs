//! Polling feed connector
//!
//! Turns an upstream direct-message feed into an input source. The feed API
//! itself sits behind the `FeedApi` trait; `http::HttpFeedClient` is the REST
//! binding used by the `feed` command and tests plug in fakes.
//!
//! Upstream throttling surfaces as `FeedError::RateLimited`, which the
//! connector absorbs by sleeping until the window resets (see `backoff`).
//! It never reaches the conversation engine.

use async_trait::async_trait;
use serde::Deserialize;
use std::fmt;
use std::time::SystemTime;

use sdk::errors::EngineError;

pub mod backoff;
pub mod http;
pub mod poller;
pub mod session_id;

pub use backoff::rate_limit_wait;
pub use http::HttpFeedClient;
pub use poller::{FeedConnector, FeedSettings, OutgoingMessage};

/// Result type for feed operations
pub type Result<T> = std::result::Result<T, FeedError>;

/// Account on the feed service
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct FeedUser {
    pub id: i64,
    pub name: String,
    pub screen_name: String,
    pub following: bool,
}

/// One upstream direct message
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct DirectMessage {
    pub id: i64,
    pub text: String,
    pub sender: FeedUser,
    pub recipient: FeedUser,
    pub created_at: String,
}

/// Single entry of an API error payload
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ApiErrorDetail {
    pub code: i64,
    pub message: String,
}

/// Errors reported by a feed binding
#[derive(Debug, Clone, thiserror::Error)]
pub enum FeedError {
    /// Upstream throttling; retry after `reset`
    #[error("Rate limited, reset at {reset:?}")]
    RateLimited { reset: SystemTime },

    /// Non-success response other than throttling
    #[error("API error (status {status}): {}", ApiErrorList(.errors))]
    Api {
        status: u16,
        errors: Vec<ApiErrorDetail>,
    },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Parse error: {0}")]
    Parse(String),
}

struct ApiErrorList<'a>(&'a [ApiErrorDetail]);

impl fmt::Display for ApiErrorList<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, detail) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "#{} code {}: {}", i + 1, detail.code, detail.message)?;
        }
        Ok(())
    }
}

impl FeedError {
    /// One line per upstream error, for operator-facing output
    pub fn report_lines(&self) -> Vec<String> {
        match self {
            FeedError::Api { errors, .. } if !errors.is_empty() => errors
                .iter()
                .enumerate()
                .map(|(i, detail)| {
                    format!(
                        "Error #{} - Code: {} Msg: {}",
                        i + 1,
                        detail.code,
                        detail.message
                    )
                })
                .collect(),
            other => vec![other.to_string()],
        }
    }
}

impl From<FeedError> for EngineError {
    fn from(err: FeedError) -> Self {
        match err {
            FeedError::RateLimited { reset } => EngineError::RateLimited { reset },
            FeedError::Api { status, errors } => EngineError::ResponseStatus {
                code: status,
                body: ApiErrorList(&errors).to_string(),
            },
            FeedError::Network(msg) => EngineError::Transport(msg),
            FeedError::Parse(msg) => EngineError::Decode(msg),
        }
    }
}

/// Feed service operations the connector relies on
#[async_trait]
pub trait FeedApi: Send + Sync {
    /// Direct messages newer than `since_id`, at most `count` of them
    ///
    /// Order is whatever the service returns; callers sort.
    async fn fetch_since(&self, since_id: i64, count: usize) -> Result<Vec<DirectMessage>>;

    /// Send a direct message to `user_id`
    async fn send(&self, user_id: i64, text: &str) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_direct_message_decodes_nested_sender() {
        let json = r#"{
            "id": 240136858829479936,
            "text": "weather in Paris?",
            "sender": {"id": 7, "name": "Ann", "screen_name": "ann"},
            "recipient": {"id": 9},
            "created_at": "Mon Aug 27 17:21:03 +0000 2012",
            "entities": {"urls": []}
        }"#;
        let message: DirectMessage = serde_json::from_str(json).unwrap();

        assert_eq!(message.id, 240136858829479936);
        assert_eq!(message.sender.id, 7);
        assert_eq!(message.sender.screen_name, "ann");
        assert_eq!(message.recipient.id, 9);
        assert!(!message.recipient.following);
    }

    #[test]
    fn test_report_lines_one_per_error() {
        let err = FeedError::Api {
            status: 403,
            errors: vec![
                ApiErrorDetail {
                    code: 150,
                    message: "not following".into(),
                },
                ApiErrorDetail {
                    code: 151,
                    message: "blocked".into(),
                },
            ],
        };

        assert_eq!(
            err.report_lines(),
            vec![
                "Error #1 - Code: 150 Msg: not following",
                "Error #2 - Code: 151 Msg: blocked"
            ]
        );
        assert!(err.to_string().contains("#2 code 151: blocked"));
    }

    #[test]
    fn test_conversion_into_engine_error() {
        let reset = SystemTime::now();
        let limited: EngineError = FeedError::RateLimited { reset }.into();
        assert!(matches!(limited, EngineError::RateLimited { reset: r } if r == reset));

        let api: EngineError = FeedError::Api {
            status: 401,
            errors: vec![ApiErrorDetail {
                code: 89,
                message: "Invalid or expired token".into(),
            }],
        }
        .into();
        assert!(
            matches!(api, EngineError::ResponseStatus { code: 401, ref body } if body.contains("Invalid or expired token"))
        );

        let network: EngineError = FeedError::Network("reset by peer".into()).into();
        assert!(matches!(network, EngineError::Transport(_)));
    }
}
