//! Directive parsing
//!
//! Each converse response carries a lower-cased `type` tag plus the payload
//! for that tag. The tag is decoded once here into a `Directive`; the rest of
//! the engine only ever matches on the enum.

use serde::Deserialize;
use std::fmt;

use sdk::types::EntityMap;

use super::{NluError, Result};

/// One parsed instruction from the NLU backend
#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    /// Run the named application action
    Action(String),

    /// Relay text to the end user
    Message(String),

    /// Fold extracted entities into the context
    Merge(EntityMap),

    /// The exchange has settled
    Stop,

    /// Unrecognised tag; treated like `Stop`
    Unknown,
}

/// Payload-free view of a directive, for logging and metrics labels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Action,
    Message,
    Merge,
    Stop,
    Unknown,
}

impl Directive {
    pub fn kind(&self) -> DirectiveKind {
        match self {
            Directive::Action(_) => DirectiveKind::Action,
            Directive::Message(_) => DirectiveKind::Message,
            Directive::Merge(_) => DirectiveKind::Merge,
            Directive::Stop => DirectiveKind::Stop,
            Directive::Unknown => DirectiveKind::Unknown,
        }
    }

    /// True for directives that end the conversation loop
    pub fn is_terminal(&self) -> bool {
        matches!(self, Directive::Stop | Directive::Unknown)
    }
}

impl fmt::Display for DirectiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectiveKind::Action => write!(f, "action"),
            DirectiveKind::Message => write!(f, "msg"),
            DirectiveKind::Merge => write!(f, "merge"),
            DirectiveKind::Stop => write!(f, "stop"),
            DirectiveKind::Unknown => write!(f, "unknown"),
        }
    }
}

/// Converse response wire format
#[derive(Debug, Deserialize)]
struct ConverseResponse {
    #[serde(rename = "type", default)]
    kind: String,

    #[serde(default)]
    msg: Option<String>,

    #[serde(default)]
    action: Option<String>,

    #[serde(default)]
    entities: Option<EntityMap>,

    #[serde(default)]
    #[allow(dead_code)]
    confidence: Option<f64>,
}

/// Decode a raw converse response body into a directive
///
/// Fails with `NluError::ParseError` when the body is not a JSON object of
/// the expected shape. An unrecognised `type` is not an error.
pub fn parse(body: &str) -> Result<Directive> {
    let response: ConverseResponse = serde_json::from_str(body)
        .map_err(|e| NluError::ParseError(format!("Failed to parse converse response: {}", e)))?;

    let directive = match response.kind.to_lowercase().as_str() {
        "action" => Directive::Action(response.action.unwrap_or_default()),
        "msg" => Directive::Message(response.msg.unwrap_or_default()),
        "merge" => Directive::Merge(response.entities.unwrap_or_default()),
        "stop" => Directive::Stop,
        other => {
            tracing::debug!("Unrecognised directive type '{}', treating as stop", other);
            Directive::Unknown
        }
    };

    Ok(directive)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_action() {
        let directive =
            parse(r#"{"type":"action","action":"fetch-weather","confidence":0.96}"#).unwrap();
        assert_eq!(directive, Directive::Action("fetch-weather".to_string()));
        assert!(!directive.is_terminal());
    }

    #[test]
    fn test_parse_message() {
        let directive = parse(r#"{"type":"msg","msg":"It's sunny in Paris"}"#).unwrap();
        assert_eq!(
            directive,
            Directive::Message("It's sunny in Paris".to_string())
        );
    }

    #[test]
    fn test_parse_merge_keeps_entity_order() {
        let directive = parse(
            r#"{"type":"merge","entities":{"location":[{"value":"Paris"},{"value":"Texas"}]}}"#,
        )
        .unwrap();

        match directive {
            Directive::Merge(entities) => {
                assert_eq!(entities.first_entity_value("location").unwrap(), "Paris");
                assert_eq!(entities.get("location").unwrap()[1].value, "Texas");
            }
            other => panic!("Expected merge, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_merge_without_entities() {
        let directive = parse(r#"{"type":"merge","entities":null}"#).unwrap();
        assert_eq!(directive, Directive::Merge(EntityMap::new()));
    }

    #[test]
    fn test_parse_stop_and_tag_case() {
        assert_eq!(parse(r#"{"type":"stop"}"#).unwrap(), Directive::Stop);
        assert_eq!(parse(r#"{"type":"STOP"}"#).unwrap(), Directive::Stop);
        assert_eq!(
            parse(r#"{"type":"Msg","msg":"hi"}"#).unwrap(),
            Directive::Message("hi".to_string())
        );
    }

    #[test]
    fn test_parse_unknown_is_terminal_not_error() {
        let directive = parse(r#"{"type":"rollback"}"#).unwrap();
        assert_eq!(directive, Directive::Unknown);
        assert!(directive.is_terminal());

        let untyped = parse(r#"{"confidence":0.2}"#).unwrap();
        assert_eq!(untyped, Directive::Unknown);
    }

    #[test]
    fn test_parse_malformed_payload() {
        assert!(matches!(parse(""), Err(NluError::ParseError(_))));
        assert!(matches!(parse("<html>"), Err(NluError::ParseError(_))));
        assert!(matches!(
            parse(r#"{"type":"msg","msg":42}"#),
            Err(NluError::ParseError(_))
        ));
    }

    #[test]
    fn test_every_directive_has_exactly_one_kind() {
        let bodies = [
            (r#"{"type":"action","action":"a"}"#, DirectiveKind::Action),
            (r#"{"type":"msg","msg":"m"}"#, DirectiveKind::Message),
            (r#"{"type":"merge","entities":{}}"#, DirectiveKind::Merge),
            (r#"{"type":"stop"}"#, DirectiveKind::Stop),
            (r#"{"type":"?"}"#, DirectiveKind::Unknown),
        ];
        for (body, kind) in bodies {
            assert_eq!(parse(body).unwrap().kind(), kind, "body: {}", body);
        }
    }
}
