//! Wit.ai NLU client
//!
//! This module implements the NluBackend trait over HTTP for the Wit.ai
//! converse API.
//!
//! Key features:
//! - Bearer token authentication
//! - Versioned API requests (`v` query parameter)
//! - Session context sent as the JSON request body
//! - Transparent gzip decoding of responses
//! - Optional logging of raw HTTP exchanges (`--debug`)

use async_trait::async_trait;
use reqwest::header::{ACCEPT, USER_AGENT};
use reqwest::{Client, RequestBuilder, StatusCode};
use std::time::Duration;

use sdk::types::{Context, SessionId};

use super::{NluBackend, NluError, Result};
use crate::config::NluConfig;
use crate::telemetry::HTTP_LOG_TARGET;

/// Wit.ai client
#[derive(Debug, Clone)]
pub struct NluClient {
    /// Base URL for the API (typically https://api.wit.ai)
    base_url: String,

    /// API version pinned on every request
    version: String,

    /// Server access token
    token: String,

    user_agent: String,

    /// Log raw requests and responses
    debug: bool,

    /// HTTP client for API requests
    client: Client,
}

impl NluClient {
    /// Create a new client from the `[nlu]` config section and an access token
    pub fn new(config: &NluConfig, token: impl Into<String>) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            version: config.api_version.clone(),
            token: token.into(),
            user_agent: config.user_agent.clone(),
            debug: false,
            client: Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .gzip(true)
                .build()
                .unwrap_or_default(),
        }
    }

    /// Log every raw HTTP exchange at debug level
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Extract meaning from a single message, outside of any conversation
    ///
    /// Returns the raw JSON body.
    pub async fn message(&self, text: &str) -> Result<String> {
        let url = format!("{}/message", self.base_url);
        let request = self
            .client
            .get(&url)
            .query(&[("v", self.version.as_str()), ("q", text)]);

        self.execute(request, None).await
    }

    /// Attach the headers every Wit.ai request carries
    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .bearer_auth(&self.token)
            .header(ACCEPT, "application/json")
            .header(USER_AGENT, &self.user_agent)
    }

    async fn execute(&self, request: RequestBuilder, body: Option<&str>) -> Result<String> {
        let request = self
            .authorize(request)
            .build()
            .map_err(|e| NluError::NetworkError(format!("Failed to build request: {}", e)))?;

        if self.debug {
            tracing::debug!(
                target: HTTP_LOG_TARGET,
                "HTTP Req: {} {}\n{}",
                request.method(),
                request.url(),
                body.unwrap_or_default()
            );
        }

        let start = std::time::Instant::now();
        let response = self.client.execute(request).await.map_err(|e| {
            if e.is_timeout() {
                NluError::Timeout
            } else if e.is_connect() {
                NluError::NetworkError(format!(
                    "Cannot connect to NLU service at {}",
                    self.base_url
                ))
            } else {
                NluError::NetworkError(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NluError::NetworkError(format!("Failed to read response body: {}", e)))?;

        tracing::debug!(
            "NLU response {} received in {:.2}s",
            status,
            start.elapsed().as_secs_f64()
        );
        if self.debug {
            tracing::debug!(target: HTTP_LOG_TARGET, "HTTP Resp: {}\n{}", status, text);
        }

        if status != StatusCode::OK {
            return Err(NluError::Status {
                code: status.as_u16(),
                body: text,
            });
        }

        Ok(text)
    }
}

#[async_trait]
impl NluBackend for NluClient {
    fn name(&self) -> &str {
        "wit"
    }

    async fn converse(
        &self,
        session_id: &SessionId,
        query: &str,
        context: &Context,
    ) -> Result<String> {
        let url = format!("{}/converse", self.base_url);

        let mut params = vec![("v", self.version.as_str())];
        if !query.is_empty() {
            params.push(("q", query));
        }
        params.push(("session_id", session_id.as_str()));

        let body = serde_json::to_string(context)
            .map_err(|e| NluError::ParseError(format!("Failed to encode context: {}", e)))?;

        tracing::debug!(
            "Converse request: session={}, query_chars={}, context_keys={}",
            session_id,
            query.len(),
            context.len()
        );

        let request = self
            .client
            .post(&url)
            .query(&params)
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body.clone());

        self.execute(request, Some(&body)).await
    }
}
