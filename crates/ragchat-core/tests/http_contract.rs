//! Wire-level checks of `HttpGateway` against a local axum server that
//! records every request it receives.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::State;
use axum::http::{header, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};

use ragchat_core::{
    ChatRole, GatewayError, HttpGateway, Mode, OperationKind, Outcome, RagGateway, Session,
};

#[derive(Debug, Clone)]
struct Recorded {
    method: Method,
    path: String,
    body: String,
}

#[derive(Clone, Default)]
struct Recorder {
    requests: Arc<Mutex<Vec<Recorded>>>,
    fail: bool,
}

impl Recorder {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

fn json_response(body: Value) -> Response {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body.to_string(),
    )
        .into_response()
}

async fn record(State(recorder): State<Recorder>, method: Method, uri: Uri, body: String) -> Response {
    let path = uri.path().to_string();
    recorder.requests.lock().unwrap().push(Recorded {
        method,
        path: path.clone(),
        body,
    });

    if recorder.fail {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            [(header::CONTENT_TYPE, "application/json")],
            r#"{"error":"OPENAI_UNAUTHORIZED","message":"OpenAI rejected your API key"}"#,
        )
            .into_response();
    }

    match path.as_str() {
        "/api/chat" | "/api/chat/explain-architecture" | "/api/chat/code-review" => json_response(json!({
            "answer": "Login is handled by AuthService.login.",
            "citations": [
                {"filePath": "auth.ts", "startLine": 10, "endLine": 20, "snippet": "export async function login()"}
            ]
        })),
        "/api/index" => json_response(json!({
            "repositoryId": 1,
            "filesScanned": 12,
            "filesIndexed": 10,
            "filesSkipped": 2,
            "documentsUpserted": 10,
            "chunksCreated": 64,
            "chunksEmbedded": 64,
            "elapsedMsTotal": 950,
            "embeddingError": null
        })),
        "/api/index/status" => json_response(json!({
            "repositoryCount": 1,
            "documentCount": 10,
            "chunksTotal": 64,
            "chunksWithEmbedding": 64,
            "chunksMissingEmbedding": 0
        })),
        "/api/reindex" => "Re-indexed 5 chunks".into_response(),
        "/api/retrieve" => json_response(json!([
            {"id": 3, "filePath": "src/auth.ts", "startLine": 1, "endLine": 30, "content": "export class AuthService {}"}
        ])),
        _ => (StatusCode::NOT_FOUND, "no such route").into_response(),
    }
}

async fn serve(fail: bool) -> (Recorder, SocketAddr) {
    let recorder = Recorder {
        requests: Arc::default(),
        fail,
    };
    let app = Router::new().fallback(record).with_state(recorder.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (recorder, addr)
}

fn gateway(addr: SocketAddr) -> HttpGateway {
    HttpGateway::new(&format!("http://{}/", addr))
}

fn body_json(recorded: &Recorded) -> Value {
    serde_json::from_str(&recorded.body).unwrap()
}

#[tokio::test]
async fn chat_submit_hits_mode_endpoint() {
    let (recorder, addr) = serve(false).await;
    let session = Session::new(gateway(addr));

    assert_eq!(session.submit("explain the login flow").await, Outcome::Completed);

    let requests = recorder.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/api/chat");
    assert_eq!(body_json(&requests[0]), json!({"message": "explain the login flow"}));

    let messages = session.messages();
    let last = messages.last().unwrap();
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.content, "Login is handled by AuthService.login.");
    assert_eq!(last.citations.len(), 1);
    assert_eq!(last.citations[0].start_line, 10);
    assert_eq!(last.citations[0].end_line, 20);
}

#[tokio::test]
async fn each_mode_uses_its_own_path() {
    let (recorder, addr) = serve(false).await;
    let gateway = gateway(addr);

    for mode in Mode::ALL {
        gateway.send_chat(mode, "review this").await.unwrap();
    }

    let paths: Vec<String> = recorder.requests().into_iter().map(|r| r.path).collect();
    assert_eq!(
        paths,
        vec!["/api/chat", "/api/chat/explain-architecture", "/api/chat/code-review"]
    );
}

#[tokio::test]
async fn index_without_root_sends_only_repo_name() {
    let (recorder, addr) = serve(false).await;
    let session = Session::new(gateway(addr));

    assert_eq!(session.run_index("docs", None).await, Outcome::Completed);

    let requests = recorder.requests();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/api/index");
    assert_eq!(body_json(&requests[0]), json!({"repoName": "docs"}));
    assert!(!requests[0].body.contains("rootPath"));

    assert_eq!(requests[1].method, Method::GET);
    assert_eq!(requests[1].path, "/api/index/status");

    assert_eq!(session.index_result().ready().map(|r| r.chunks_created), Some(64));
    assert_eq!(session.status().map(|s| s.chunks_with_embedding), Some(64));
}

#[tokio::test]
async fn index_with_root_sends_it() {
    let (recorder, addr) = serve(false).await;
    gateway(addr).start_index("api", Some("/srv/api")).await.unwrap();

    let requests = recorder.requests();
    assert_eq!(body_json(&requests[0]), json!({"repoName": "api", "rootPath": "/srv/api"}));
}

#[tokio::test]
async fn reindex_returns_plain_text() {
    let (recorder, addr) = serve(false).await;
    let summary = gateway(addr).start_reindex().await.unwrap();
    assert_eq!(summary, "Re-indexed 5 chunks");

    let requests = recorder.requests();
    assert_eq!(requests[0].method, Method::POST);
    assert_eq!(requests[0].path, "/api/reindex");
    assert!(requests[0].body.is_empty());
}

#[tokio::test]
async fn retrieve_posts_question() {
    let (recorder, addr) = serve(false).await;
    let chunks = gateway(addr).retrieve("where is login?").await.unwrap();

    assert_eq!(chunks.len(), 1);
    assert_eq!(chunks[0].file_path, "src/auth.ts");
    assert_eq!(body_json(&recorder.requests()[0]), json!({"question": "where is login?"}));
}

#[tokio::test]
async fn failure_status_becomes_service_error() {
    let (_recorder, addr) = serve(true).await;
    let err = gateway(addr).get_status().await.unwrap_err();

    match &err {
        GatewayError::Service { status, body } => {
            assert_eq!(*status, 503);
            assert!(body.contains("OPENAI_UNAUTHORIZED"));
        }
        other => panic!("expected service error, got {:?}", other),
    }
    assert_eq!(err.user_message(), "service returned 503: OpenAI rejected your API key");
}

#[tokio::test]
async fn failed_chat_lands_in_transcript() {
    let (_recorder, addr) = serve(true).await;
    let session = Session::new(gateway(addr));

    assert_eq!(session.submit("hello").await, Outcome::Failed);
    let messages = session.messages();
    assert_eq!(messages.len(), 2);
    assert_eq!(
        messages[1].content,
        "Error: service returned 503: OpenAI rejected your API key"
    );
    assert!(!session.is_busy(OperationKind::Send));
}

#[tokio::test]
async fn unreachable_service_is_transport_error() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let err = gateway(addr).get_status().await.unwrap_err();
    assert!(matches!(err, GatewayError::Transport(_)));
}
