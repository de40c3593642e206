//! Credentials file
//!
//! The feed command reads its secrets from a plain five-line file:
//!
//! ```text
//! <feed consumer key>
//! <feed consumer secret>
//! <feed access token>
//! <feed access token secret>
//! <NLU server token>
//! ```
//!
//! Surrounding whitespace on each line is ignored; lines past the fifth are
//! ignored too.

use sdk::errors::EngineError;
use std::fmt;
use std::fs;
use std::path::Path;

use super::expand_path;

/// Number of lines a credentials file must provide
const REQUIRED_LINES: usize = 5;

/// Secrets for the feed API and the NLU service
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
    pub nlu_token: String,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("access_token", &"<redacted>")
            .field("access_token_secret", &"<redacted>")
            .field("nlu_token", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read credentials from `path` (supports ~ expansion)
    pub fn load(path: &Path) -> Result<Self, EngineError> {
        let path = expand_path(path)?;
        let contents = fs::read_to_string(&path).map_err(|e| {
            EngineError::Config(format!(
                "Failed to read credentials file {:?}: {}",
                path, e
            ))
        })?;

        Self::parse(&contents)
    }

    /// Parse the five-line credentials format
    pub fn parse(contents: &str) -> Result<Self, EngineError> {
        let lines: Vec<&str> = contents.lines().map(str::trim).collect();
        if lines.len() < REQUIRED_LINES {
            return Err(EngineError::Config(format!(
                "Credentials file did not have enough lines (expected {}, found {})",
                REQUIRED_LINES,
                lines.len()
            )));
        }

        let labels = [
            "consumer key",
            "consumer secret",
            "access token",
            "access token secret",
            "NLU token",
        ];
        for (line, label) in lines.iter().zip(labels) {
            if line.is_empty() {
                return Err(EngineError::Config(format!(
                    "Credentials file is missing the {}",
                    label
                )));
            }
        }

        Ok(Self {
            consumer_key: lines[0].to_string(),
            consumer_secret: lines[1].to_string(),
            access_token: lines[2].to_string(),
            access_token_secret: lines[3].to_string(),
            nlu_token: lines[4].to_string(),
        })
    }
}
