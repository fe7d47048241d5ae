//! End-to-end tests of the HTTP adapters against an in-process axum server.

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::{Json, Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use bytes::Bytes;
use secrecy::SecretString;

use datachat_core::chat::service::ConversationService;
use datachat_core::repository::message::MessageStore;
use datachat_core::stream::transport::StreamTransport;
use datachat_infra::http::ApiClient;
use datachat_infra::http::message_store::HttpMessageStore;
use datachat_infra::http::transport::HttpStreamTransport;
use datachat_types::chat::{ChatRequest, Message, MessageRole, NewMessage};
use datachat_types::config::ClientConfig;
use datachat_types::error::{RepositoryError, StreamError};
use datachat_types::progress::{FailureKind, TurnOutcome};

const TOKEN: &str = "test-token";

#[derive(Clone, Default)]
struct ServerState {
    messages: Arc<Mutex<Vec<Message>>>,
}

fn authorized(headers: &HeaderMap) -> bool {
    let expected = format!("Bearer {TOKEN}");
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        == Some(expected.as_str())
}

fn turn_body(question: &str) -> String {
    format!(
        "event: thinking\ndata: {{\"content\":\"读取表结构\"}}\n\n\
event: schema_loaded\ndata: {{\"tables\":[\"orders\"]}}\n\n\
event: sql_generated\ndata: {{\"sql\":\"SELECT 1\"}}\n\n\
event: sql_executing\ndata: {{}}\n\n\
event: sql_result\ndata: {{\"columns\":[\"x\"],\"rows\":[{{\"x\":1}}]}}\n\n\
event: chart_ready\ndata: {{\"option\":{{\"series\":[]}},\"chart_type\":\"bar\"}}\n\n\
event: summary\ndata: {{\"content\":\"共 1 行: {question}\"}}\n\n\
event: done\ndata: {{\"session_title\":\"测试\"}}\n\n"
    )
}

/// Stream `body` in 7-byte chunks so multi-byte characters straddle chunks.
fn chunked_body(body: String) -> Body {
    let bytes = Bytes::from(body);
    Body::from_stream(async_stream::stream! {
        for start in (0..bytes.len()).step_by(7) {
            let end = (start + 7).min(bytes.len());
            tokio::time::sleep(Duration::from_millis(1)).await;
            yield Ok::<_, Infallible>(bytes.slice(start..end));
        }
    })
}

async fn chat_stream(headers: HeaderMap, Json(request): Json<ChatRequest>) -> Response {
    if !authorized(&headers) {
        return (StatusCode::UNAUTHORIZED, "missing token").into_response();
    }
    Response::builder()
        .header(header::CONTENT_TYPE, "text/event-stream")
        .body(chunked_body(turn_body(&request.question)))
        .unwrap()
}

async fn broken_stream() -> Response {
    (StatusCode::INTERNAL_SERVER_ERROR, "db down").into_response()
}

async fn stalled_stream() -> Response {
    let body = Body::from_stream(async_stream::stream! {
        yield Ok::<_, Infallible>(Bytes::from_static(b"event: thinking\ndata: {\"content\":\"a\"}\n\n"));
        std::future::pending::<()>().await;
    });
    Response::new(body)
}

async fn create_message(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
    Json(new): Json<NewMessage>,
) -> Response {
    let mut messages = state.messages.lock().unwrap();
    let message = Message {
        id: format!("msg-{}", messages.len() + 1),
        session_id,
        role: new.role,
        content: new.content,
        sql: new.sql,
        chart_cfg: new.chart_cfg,
        thinking: new.thinking,
        data: new.data,
        created_at: "2026-01-01T00:00:00".to_string(),
    };
    messages.push(message.clone());
    (StatusCode::CREATED, Json(message)).into_response()
}

async fn list_messages(
    State(state): State<ServerState>,
    Path(session_id): Path<String>,
) -> Response {
    if session_id == "missing" {
        return (
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({"detail": "session missing does not exist"})),
        )
            .into_response();
    }
    let messages: Vec<Message> = state
        .messages
        .lock()
        .unwrap()
        .iter()
        .filter(|m| m.session_id == session_id)
        .cloned()
        .collect();
    Json(messages).into_response()
}

async fn spawn_server(state: ServerState) -> String {
    let app = Router::new()
        .route("/api/chat/stream", post(chat_stream))
        .route("/api/broken/stream", post(broken_stream))
        .route("/api/stalled/stream", post(stalled_stream))
        .route(
            "/api/sessions/{session_id}/messages",
            get(list_messages).post(create_message),
        )
        .with_state(state);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{addr}/api")
}

fn config(base_url: &str) -> ClientConfig {
    ClientConfig {
        base_url: base_url.to_string(),
        ..ClientConfig::default()
    }
}

fn api(config: &ClientConfig, token: Option<&str>) -> Arc<ApiClient> {
    Arc::new(ApiClient::new(config, token.map(|t| SecretString::from(t.to_string()))).unwrap())
}

#[tokio::test]
async fn full_turn_over_http_persists_answer() {
    let state = ServerState::default();
    let base_url = spawn_server(state.clone()).await;
    let config = config(&base_url);
    let api = api(&config, Some(TOKEN));

    let service = ConversationService::new(
        HttpStreamTransport::new(Arc::clone(&api), config.stream_path.clone()),
        HttpMessageStore::new(api),
        config,
    );
    service.activate("s1");

    let outcome = service.ask("s1", "一共几行？").await;

    let message = outcome.message().expect("answer stored").clone();
    assert_eq!(message.id, "msg-1");
    assert_eq!(message.role, MessageRole::Assistant);
    assert_eq!(message.content, "共 1 行: 一共几行？");
    assert_eq!(message.sql.as_deref(), Some("SELECT 1"));
    assert_eq!(message.thinking.as_deref(), Some("读取表结构"));
    assert_eq!(message.chart_option().unwrap()["series"], serde_json::json!([]));

    let history = service.history("s1").await.unwrap();
    assert_eq!(history, vec![message]);

    let analysis = service.analysis();
    assert_eq!(analysis.sql, "SELECT 1");
    assert_eq!(analysis.chart_type, "bar");
    assert!(analysis.panel_visible);
    assert_eq!(state.messages.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn error_status_fails_before_any_chunk() {
    let base_url = spawn_server(ServerState::default()).await;
    let config = config(&base_url);
    let transport = HttpStreamTransport::new(api(&config, Some(TOKEN)), "/broken/stream");

    let err = match transport.open(&ChatRequest::new("s1", "q")).await {
        Err(err) => err,
        Ok(_) => panic!("expected an error status"),
    };
    assert_eq!(
        err,
        StreamError::Http {
            status: 500,
            body: "db down".to_string()
        }
    );
}

#[tokio::test]
async fn missing_token_is_rejected() {
    let base_url = spawn_server(ServerState::default()).await;
    let config = config(&base_url);
    let service = ConversationService::new(
        HttpStreamTransport::new(api(&config, None), config.stream_path.clone()),
        HttpMessageStore::new(api(&config, None)),
        config,
    );

    let outcome = service.ask("s1", "q").await;
    assert!(matches!(
        outcome,
        TurnOutcome::Failed {
            kind: FailureKind::Transport,
            ..
        }
    ));
}

#[tokio::test]
async fn stalled_stream_hits_idle_timeout() {
    let base_url = spawn_server(ServerState::default()).await;
    let config = ClientConfig {
        idle_timeout_secs: 1,
        ..config(&base_url)
    };
    let api = api(&config, Some(TOKEN));
    let service = ConversationService::new(
        HttpStreamTransport::new(Arc::clone(&api), "/stalled/stream"),
        HttpMessageStore::new(api),
        config,
    );

    let outcome = tokio::time::timeout(Duration::from_secs(10), service.ask("s1", "q"))
        .await
        .expect("idle timeout should end the turn");
    assert!(matches!(
        outcome,
        TurnOutcome::Failed {
            kind: FailureKind::Transport,
            ..
        }
    ));
}

#[tokio::test]
async fn connection_refused_is_connect_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let config = config(&format!("http://{addr}/api"));
    let transport = HttpStreamTransport::new(api(&config, None), "/chat/stream");
    let result = transport.open(&ChatRequest::new("s1", "q")).await;
    assert!(matches!(result, Err(StreamError::Connect(_))));
}

#[tokio::test]
async fn message_store_maps_not_found() {
    let base_url = spawn_server(ServerState::default()).await;
    let config = config(&base_url);
    let store = HttpMessageStore::new(api(&config, Some(TOKEN)));

    let err = store.list_messages("missing").await.unwrap_err();
    assert!(matches!(err, RepositoryError::NotFound));
    assert!(store.list_messages("empty").await.unwrap().is_empty());
}
