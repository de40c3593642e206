//! Direct-message REST binding
//!
//! Implements `FeedApi` over the v1.1 direct message endpoints, signing each
//! request with OAuth 1.0a (HMAC-SHA1).
//!
//! Throttling comes back as HTTP 429 with the window reset in the
//! `x-rate-limit-reset` header (unix seconds).

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use hmac::{Hmac, Mac};
use reqwest::header::{HeaderMap, AUTHORIZATION};
use reqwest::{Client, Method, StatusCode};
use serde::Deserialize;
use sha1::Sha1;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use super::{ApiErrorDetail, DirectMessage, FeedApi, FeedError, Result};
use crate::config::credentials::Credentials;
use crate::config::FeedConfig;
use crate::telemetry::HTTP_LOG_TARGET;

type HmacSha1 = Hmac<Sha1>;

const DIRECT_MESSAGES_PATH: &str = "/1.1/direct_messages.json";
const NEW_DIRECT_MESSAGE_PATH: &str = "/1.1/direct_messages/new.json";
const RATE_LIMIT_RESET_HEADER: &str = "x-rate-limit-reset";

/// OAuth 1.0a consumer and access token pairs
#[derive(Clone)]
pub struct OAuthKeys {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub token: String,
    pub token_secret: String,
}

impl std::fmt::Debug for OAuthKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OAuthKeys")
            .field("consumer_key", &self.consumer_key)
            .field("token", &"<redacted>")
            .finish()
    }
}

impl From<&Credentials> for OAuthKeys {
    fn from(credentials: &Credentials) -> Self {
        Self {
            consumer_key: credentials.consumer_key.clone(),
            consumer_secret: credentials.consumer_secret.clone(),
            token: credentials.access_token.clone(),
            token_secret: credentials.access_token_secret.clone(),
        }
    }
}

/// Percent-encode per RFC 3986, as OAuth requires
fn encode(value: &str) -> String {
    urlencoding::encode(value).into_owned()
}

/// Compute the HMAC-SHA1 request signature
///
/// `params` holds every query/body parameter plus the `oauth_*` protocol
/// parameters, unencoded.
pub fn signature(
    method: &Method,
    url: &str,
    params: &[(String, String)],
    keys: &OAuthKeys,
) -> Result<String> {
    let mut encoded: Vec<(String, String)> =
        params.iter().map(|(k, v)| (encode(k), encode(v))).collect();
    encoded.sort();

    let param_string = encoded
        .iter()
        .map(|(k, v)| format!("{}={}", k, v))
        .collect::<Vec<_>>()
        .join("&");

    let base = format!(
        "{}&{}&{}",
        method.as_str(),
        encode(url),
        encode(&param_string)
    );
    let key = format!(
        "{}&{}",
        encode(&keys.consumer_secret),
        encode(&keys.token_secret)
    );

    let mut mac = HmacSha1::new_from_slice(key.as_bytes())
        .map_err(|e| FeedError::Network(format!("Failed to initialise request signer: {}", e)))?;
    mac.update(base.as_bytes());

    Ok(STANDARD.encode(mac.finalize().into_bytes()))
}

/// Build the `Authorization` header value for one request
pub fn authorization_header(
    method: &Method,
    url: &str,
    params: &[(&str, String)],
    keys: &OAuthKeys,
    nonce: &str,
    timestamp: u64,
) -> Result<String> {
    let mut oauth: Vec<(String, String)> = vec![
        ("oauth_consumer_key".into(), keys.consumer_key.clone()),
        ("oauth_nonce".into(), nonce.to_string()),
        ("oauth_signature_method".into(), "HMAC-SHA1".into()),
        ("oauth_timestamp".into(), timestamp.to_string()),
        ("oauth_token".into(), keys.token.clone()),
        ("oauth_version".into(), "1.0".into()),
    ];

    let mut all = oauth.clone();
    all.extend(params.iter().map(|(k, v)| (k.to_string(), v.clone())));
    let signature = signature(method, url, &all, keys)?;
    oauth.push(("oauth_signature".into(), signature));
    oauth.sort();

    let fields = oauth
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", encode(k), encode(v)))
        .collect::<Vec<_>>()
        .join(", ");

    Ok(format!("OAuth {}", fields))
}

#[derive(Debug, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    errors: Vec<ApiErrorDetail>,
}

/// Reset time advertised by a throttled response, or now when absent
fn rate_limit_reset(headers: &HeaderMap) -> SystemTime {
    headers
        .get(RATE_LIMIT_RESET_HEADER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(|secs| UNIX_EPOCH + Duration::from_secs(secs))
        .unwrap_or_else(SystemTime::now)
}

/// Decode an error body into its error list, keeping the raw body otherwise
fn api_errors(status: StatusCode, body: &str) -> Vec<ApiErrorDetail> {
    match serde_json::from_str::<ErrorPayload>(body) {
        Ok(payload) if !payload.errors.is_empty() => payload.errors,
        _ => vec![ApiErrorDetail {
            code: i64::from(status.as_u16()),
            message: body.to_string(),
        }],
    }
}

/// Signed HTTP client for the direct message API
#[derive(Debug, Clone)]
pub struct HttpFeedClient {
    base_url: String,
    keys: OAuthKeys,
    debug: bool,
    client: Client,
}

impl HttpFeedClient {
    pub fn new(config: &FeedConfig, keys: OAuthKeys) -> Self {
        Self {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            keys,
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

    async fn request(&self, method: Method, path: &str, params: &[(&str, String)]) -> Result<String> {
        let endpoint = format!("{}{}", self.base_url, path);
        let query = params
            .iter()
            .map(|(k, v)| format!("{}={}", encode(k), encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        let url = if query.is_empty() {
            endpoint.clone()
        } else {
            format!("{}?{}", endpoint, query)
        };

        let nonce = uuid::Uuid::new_v4().simple().to_string();
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        let auth = authorization_header(&method, &endpoint, params, &self.keys, &nonce, timestamp)?;

        if self.debug {
            tracing::debug!(target: HTTP_LOG_TARGET, "HTTP Req: {} {}", method, url);
        }

        let response = self
            .client
            .request(method, &url)
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FeedError::Network(format!("Request to {} timed out", endpoint))
                } else {
                    FeedError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        let reset = rate_limit_reset(response.headers());
        let body = response
            .text()
            .await
            .map_err(|e| FeedError::Network(format!("Failed to read response body: {}", e)))?;

        if self.debug {
            tracing::debug!(target: HTTP_LOG_TARGET, "HTTP Resp: {}\n{}", status, body);
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(FeedError::RateLimited { reset });
        }
        if !status.is_success() {
            return Err(FeedError::Api {
                status: status.as_u16(),
                errors: api_errors(status, &body),
            });
        }

        Ok(body)
    }
}

#[async_trait]
impl FeedApi for HttpFeedClient {
    async fn fetch_since(&self, since_id: i64, count: usize) -> Result<Vec<DirectMessage>> {
        let mut params = Vec::new();
        if since_id > 0 {
            params.push(("since_id", since_id.to_string()));
        }
        params.push(("count", count.to_string()));

        let body = self.request(Method::GET, DIRECT_MESSAGES_PATH, &params).await?;

        serde_json::from_str(&body)
            .map_err(|e| FeedError::Parse(format!("Failed to parse direct messages: {}", e)))
    }

    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        let params = [("user_id", user_id.to_string()), ("text", text.to_string())];
        self.request(Method::POST, NEW_DIRECT_MESSAGE_PATH, &params)
            .await
            .map(|_| ())
    }
}
