//! Integration tests for the conversation pipeline
//!
//! These tests run the NLU client, conversation engine and driver against a
//! wiremock stand-in for the NLU service.

use async_trait::async_trait;
use parley_engine::config::NluConfig;
use parley_engine::conversation::{ConversationEngine, Driver};
use parley_engine::input::InputSource;
use parley_engine::nlu::{NluBackend, NluClient, NluError};
use sdk::errors::EngineError;
use sdk::handler::{Handler, HandlerResult};
use sdk::types::{Context, EntityMap, InputRecord, Session, SessionId};
use serde_json::json;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use wiremock::{
    matchers::{body_json, header, method, path, query_param, query_param_is_missing},
    Mock, MockServer, ResponseTemplate,
};

fn client_for(server: &MockServer) -> NluClient {
    let config = NluConfig {
        base_url: server.uri(),
        ..NluConfig::default()
    };
    NluClient::new(&config, "test-token")
}

fn stop() -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"type": "stop", "confidence": 1.0}))
}

/// Handler that records what it was asked to say
#[derive(Default)]
struct TranscriptHandler {
    said: Mutex<Vec<String>>,
}

#[async_trait]
impl Handler for TranscriptHandler {
    async fn action(&self, mut session: Session, _action: &str) -> HandlerResult {
        session.context.set("forecast", "sunny");
        Ok(session)
    }

    async fn say(&self, session: Session, message: &str) -> HandlerResult {
        self.said.lock().unwrap().push(message.to_string());
        Ok(session)
    }

    async fn merge(&self, mut session: Session, entities: &EntityMap) -> HandlerResult {
        match entities.first_entity_value("location") {
            Ok(loc) => session.context.set("loc", loc),
            Err(_) => session.context.clear(),
        }
        Ok(session)
    }

    async fn error(&self, _session: &Session, _message: &str) {}
}

/// Input source that replays fixed records, waiting for each acknowledgement
struct ScriptedInput {
    records: Vec<InputRecord>,
    acks: Arc<Mutex<Vec<SessionId>>>,
}

impl InputSource for ScriptedInput {
    fn run(self) -> (mpsc::Sender<SessionId>, mpsc::Receiver<InputRecord>) {
        let (ack_tx, mut ack_rx) = mpsc::channel(4);
        let (record_tx, record_rx) = mpsc::channel(1);
        let acks = self.acks;

        tokio::spawn(async move {
            for record in self.records {
                if record_tx.send(record).await.is_err() {
                    return;
                }
                match ack_rx.recv().await {
                    Some(id) => acks.lock().unwrap().push(id),
                    None => return,
                }
            }
        });

        (ack_tx, record_rx)
    }
}

#[tokio::test]
async fn test_converse_request_shape() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .and(query_param("v", "20160412"))
        .and(query_param("q", "weather in Paris"))
        .and(query_param("session_id", "s-1"))
        .and(header("authorization", "Bearer test-token"))
        .and(header("accept", "application/json"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"loc": "Berlin"})))
        .respond_with(stop())
        .expect(1)
        .mount(&server)
        .await;

    let mut context = Context::new();
    context.set("loc", "Berlin");

    let body = client_for(&server)
        .converse(&SessionId::from("s-1"), "weather in Paris", &context)
        .await
        .unwrap();

    assert!(body.contains("stop"));
}

#[tokio::test]
async fn test_empty_query_is_omitted() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .and(query_param_is_missing("q"))
        .and(body_json(json!({})))
        .respond_with(stop())
        .expect(1)
        .mount(&server)
        .await;

    client_for(&server)
        .converse(&SessionId::from("s-1"), "", &Context::new())
        .await
        .unwrap();
}

#[tokio::test]
async fn test_error_status_keeps_code_and_body() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .respond_with(ResponseTemplate::new(400).set_body_string(r#"{"error":"Bad request"}"#))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .converse(&SessionId::from("s-1"), "hi", &Context::new())
        .await
        .unwrap_err();

    match err {
        NluError::Status { code, body } => {
            assert_eq!(code, 400);
            assert_eq!(body, r#"{"error":"Bad request"}"#);
        }
        other => panic!("Expected Status error, got: {:?}", other),
    }
}

#[tokio::test]
async fn test_connection_error() {
    let config = NluConfig {
        base_url: "http://127.0.0.1:1".to_string(),
        ..NluConfig::default()
    };
    let client = NluClient::new(&config, "test-token");

    let err = client
        .converse(&SessionId::from("s-1"), "hi", &Context::new())
        .await
        .unwrap_err();

    assert!(matches!(err, NluError::NetworkError(_) | NluError::Timeout));
}

#[tokio::test]
async fn test_message_endpoint() {
    let server = MockServer::start().await;
    let meaning = json!({
        "msg_id": "abc",
        "_text": "weather in Paris",
        "entities": {"location": [{"value": "Paris", "confidence": 0.97}]}
    });

    Mock::given(method("GET"))
        .and(path("/message"))
        .and(query_param("v", "20160412"))
        .and(query_param("q", "weather in Paris"))
        .and(header("authorization", "Bearer test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(meaning.clone()))
        .expect(1)
        .mount(&server)
        .await;

    let body = client_for(&server).message("weather in Paris").await.unwrap();
    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap();

    assert_eq!(parsed, meaning);
}

#[tokio::test]
async fn test_full_exchange_through_driver() {
    let server = MockServer::start().await;

    // First query: merge, action, msg, stop
    Mock::given(method("POST"))
        .and(path("/converse"))
        .and(query_param("q", "weather in Paris"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "type": "merge",
            "entities": {"location": [{"value": "Paris"}]}
        })))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .and(query_param_is_missing("q"))
        .and(body_json(json!({"loc": "Paris"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"type": "action", "action": "fetch-weather"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .and(query_param_is_missing("q"))
        .and(body_json(json!({"loc": "Paris", "forecast": "sunny"})))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"type": "msg", "msg": "It's sunny in Paris"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Second query sees the stored context
    Mock::given(method("POST"))
        .and(path("/converse"))
        .and(query_param("q", "thanks"))
        .and(body_json(json!({"loc": "Paris", "forecast": "sunny"})))
        .respond_with(stop())
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .respond_with(stop())
        .mount(&server)
        .await;

    let handler = Arc::new(TranscriptHandler::default());
    let engine = ConversationEngine::new(Arc::new(client_for(&server)), handler.clone());
    let mut driver = Driver::new(engine);

    let acks = Arc::new(Mutex::new(Vec::new()));
    let input = ScriptedInput {
        records: vec![
            InputRecord::new(SessionId::from("alice"), "weather in Paris"),
            InputRecord::new(SessionId::from("alice"), "thanks"),
        ],
        acks: acks.clone(),
    };

    driver.run(input).await.unwrap();

    assert_eq!(
        *handler.said.lock().unwrap(),
        vec!["It's sunny in Paris".to_string()]
    );
    assert_eq!(
        *acks.lock().unwrap(),
        vec![SessionId::from("alice"), SessionId::from("alice")]
    );

    let session = driver.store().get(&SessionId::from("alice")).unwrap();
    assert_eq!(session.context.get_str("loc"), Some("Paris"));
    assert_eq!(session.context.get_str("forecast"), Some("sunny"));
}

#[tokio::test]
async fn test_driver_stops_on_backend_error() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    let engine = ConversationEngine::new(
        Arc::new(client_for(&server)),
        Arc::new(TranscriptHandler::default()),
    );
    let mut driver = Driver::new(engine);

    let acks = Arc::new(Mutex::new(Vec::new()));
    let input = ScriptedInput {
        records: vec![
            InputRecord::new(SessionId::from("bob"), "hello"),
            InputRecord::new(SessionId::from("bob"), "never sent"),
        ],
        acks: acks.clone(),
    };

    let err = driver.run(input).await.unwrap_err();

    assert!(matches!(err, EngineError::ResponseStatus { code: 500, .. }));
    assert!(acks.lock().unwrap().is_empty());
    assert!(driver.store().is_empty());
}

#[tokio::test]
async fn test_driver_rejects_malformed_directive() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let engine = ConversationEngine::new(
        Arc::new(client_for(&server)),
        Arc::new(TranscriptHandler::default()),
    );
    let mut driver = Driver::new(engine);

    let input = ScriptedInput {
        records: vec![InputRecord::new(SessionId::from("carol"), "hi")],
        acks: Arc::new(Mutex::new(Vec::new())),
    };

    let err = driver.run(input).await.unwrap_err();
    assert!(matches!(err, EngineError::Decode(_)));
}

#[tokio::test]
async fn test_driver_finishes_when_input_closes() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/converse"))
        .respond_with(stop())
        .expect(3)
        .mount(&server)
        .await;

    let engine = ConversationEngine::new(
        Arc::new(client_for(&server)),
        Arc::new(TranscriptHandler::default()),
    );
    let mut driver = Driver::new(engine);

    let acks = Arc::new(Mutex::new(Vec::new()));
    let input = ScriptedInput {
        records: vec![
            InputRecord::new(SessionId::from("a"), "1"),
            InputRecord::new(SessionId::from("b"), "2"),
            InputRecord::new(SessionId::from("a"), "3"),
        ],
        acks: acks.clone(),
    };

    driver.run(input).await.unwrap();

    assert_eq!(acks.lock().unwrap().len(), 3);
    assert_eq!(driver.store().len(), 2);
}
