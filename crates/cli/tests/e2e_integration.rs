//! End-to-end integration tests for ChatPTK.
//!
//! These tests wire the real stack together (config, OpenAI-compatible
//! provider, tutor pipeline, HTTP gateway) and point it at a local mock
//! upstream, so every request crosses a real HTTP boundary twice.

use std::sync::{Arc, Mutex};

use axum::body::Body;
use axum::extract::State;
use axum::http::{Request, StatusCode, header};
use axum::response::{IntoResponse, Response};
use chatptk_config::AppConfig;
use chatptk_gateway::session::SessionCookies;
use chatptk_gateway::{GatewayState, build_router};
use chatptk_memory::InMemorySessionStore;
use chatptk_tutor::TutorPipeline;
use http_body_util::BodyExt;
use serde_json::{Value, json};
use tower::ServiceExt;

// ── Mock Upstream ────────────────────────────────────────────────────────

/// An OpenAI-compatible `/v1/chat/completions` endpoint with a fixed reply.
struct Upstream {
    reply: String,
    status: StatusCode,
    /// Verbatim SSE body for streaming requests, instead of `reply` split into chunks
    raw_sse: Option<&'static str>,
    bodies: Mutex<Vec<Value>>,
}

impl Upstream {
    fn calls(&self) -> usize {
        self.bodies.lock().unwrap().len()
    }

    fn body(&self, index: usize) -> Value {
        self.bodies.lock().unwrap()[index].clone()
    }
}

async fn completions(State(upstream): State<Arc<Upstream>>, axum::Json(body): axum::Json<Value>) -> Response {
    let stream = body["stream"].as_bool().unwrap_or(false);
    upstream.bodies.lock().unwrap().push(body);

    if upstream.status != StatusCode::OK {
        return upstream.status.into_response();
    }

    if let (true, Some(raw)) = (stream, upstream.raw_sse) {
        return ([(header::CONTENT_TYPE, "text/event-stream")], raw).into_response();
    }

    if stream {
        let mut sse = String::new();
        for piece in upstream.reply.split_inclusive(' ') {
            let chunk = json!({"choices": [{"delta": {"content": piece}, "finish_reason": null}]});
            sse.push_str(&format!("data: {chunk}\n\n"));
        }
        sse.push_str("data: [DONE]\n\n");
        return ([(header::CONTENT_TYPE, "text/event-stream")], sse).into_response();
    }

    axum::Json(json!({
        "model": "llama-3.1-8b-instant",
        "choices": [{"message": {"role": "assistant", "content": upstream.reply}, "finish_reason": "stop"}],
        "usage": {"prompt_tokens": 12, "completion_tokens": 8, "total_tokens": 20}
    }))
    .into_response()
}

async fn spawn_upstream(
    reply: &str,
    status: StatusCode,
    raw_sse: Option<&'static str>,
) -> (Arc<Upstream>, String) {
    let upstream = Arc::new(Upstream {
        reply: reply.to_string(),
        status,
        raw_sse,
        bodies: Mutex::new(Vec::new()),
    });
    let router = axum::Router::new()
        .route("/v1/chat/completions", axum::routing::post(completions))
        .with_state(upstream.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    (upstream, format!("http://{addr}/v1"))
}

// ── Fixture ──────────────────────────────────────────────────────────────

struct Stack {
    app: axum::Router,
    upstream: Arc<Upstream>,
    _data: tempfile::TempDir,
}

async fn stack(reply: &str, status: StatusCode) -> Stack {
    stack_with_sse(reply, status, None).await
}

async fn stack_with_sse(reply: &str, status: StatusCode, raw_sse: Option<&'static str>) -> Stack {
    let (upstream, base_url) = spawn_upstream(reply, status, raw_sse).await;

    let data = tempfile::tempdir().unwrap();
    let students_path = data.path().join("students.json");
    let lessons_path = data.path().join("knowledge.json");
    std::fs::write(
        &students_path,
        json!({"students": [
            {"student_id": "2024-0001", "first_name": "Maria", "last_name": "Santos", "balance": 1500.0},
            {"student_id": "2024-0002", "first_name": "Jose", "last_name": "Rizal", "balance": 12345.5}
        ]})
        .to_string(),
    )
    .unwrap();
    std::fs::write(
        &lessons_path,
        json!({"lessons": [
            {"topic": "synonym", "content": "A synonym is a word that means the same as another word."}
        ]})
        .to_string(),
    )
    .unwrap();

    let mut config = AppConfig::default();
    config.api_key = Some("gsk-test".into());
    config.session_secret = Some("e2e-secret".into());
    config.api_url = Some(base_url);
    config.data.students_path = students_path;
    config.data.lessons_path = lessons_path;

    let secrets = config.require_secrets().unwrap();
    let provider = chatptk_providers::build_from_config(&config, &secrets.api_key);
    let sessions = Arc::new(InMemorySessionStore::from_config(&config.session));
    let pipeline = TutorPipeline::from_config(&config, provider, sessions);
    let cookies = SessionCookies::from_config(&secrets.session_secret, &config.session).unwrap();

    let app = build_router(
        Arc::new(GatewayState { pipeline, cookies }),
        &config.gateway.allowed_origins,
    );

    Stack {
        app,
        upstream,
        _data: data,
    }
}

fn post(uri: &str, body: Value, cookie: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json");
    if let Some(cookie) = cookie {
        builder = builder.header(header::COOKIE, cookie);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

async fn text(response: Response) -> String {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn reply(response: Response) -> String {
    let json: Value = serde_json::from_str(&text(response).await).unwrap();
    json["reply"].as_str().unwrap().to_string()
}

fn session_cookie(response: &Response) -> String {
    let set_cookie = response.headers()[header::SET_COOKIE].to_str().unwrap();
    set_cookie.split(';').next().unwrap().to_string()
}

// ── E2E: Local Answers ───────────────────────────────────────────────────

#[tokio::test]
async fn e2e_greeting_never_reaches_upstream() {
    let s = stack("unused", StatusCode::OK).await;
    let response = s
        .app
        .oneshot(post("/chat", json!({"message": "hi", "mode": "grammar"}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(reply(response).await, chatptk_tutor::responder::CASUAL.response);
    assert_eq!(s.upstream.calls(), 0);
}

#[tokio::test]
async fn e2e_balance_and_name_from_students_file() {
    let s = stack("unused", StatusCode::OK).await;

    let response = s
        .app
        .clone()
        .oneshot(post("/chat", json!({"message": "What is my balance?", "student_id": "2024-0002"}), None))
        .await
        .unwrap();
    assert_eq!(reply(response).await, "Your current balance is ₱12,345.50.");

    // No student id: the configured default student answers
    let response = s
        .app
        .oneshot(post("/chat", json!({"message": "What is my name?"}), None))
        .await
        .unwrap();
    assert_eq!(reply(response).await, "You are Maria Santos.");

    assert_eq!(s.upstream.calls(), 0);
}

// ── E2E: Model Turns ─────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_vocabulary_question_with_lesson_knowledge() {
    let s = stack("A synonym for happy is joyful.", StatusCode::OK).await;
    let response = s
        .app
        .oneshot(post(
            "/chat",
            json!({"message": "What is a synonym for happy?", "mode": "vocabulary"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(reply(response).await, "A synonym for happy is joyful.");
    assert_eq!(s.upstream.calls(), 1);

    let body = s.upstream.body(0);
    assert_eq!(body["model"], "llama-3.1-8b-instant");
    assert_eq!(body["stream"], false);
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["role"], "system");
    assert!(messages[0]["content"].as_str().unwrap().contains("VOCABULARY"));
    assert_eq!(messages[1]["role"], "user");
    assert!(messages[1]["content"]
        .as_str()
        .unwrap()
        .starts_with("A synonym is a word that means the same as another word."));
}

#[tokio::test]
async fn e2e_grammar_quiz_carries_question_across_turns() {
    let s = stack("Correct!\nNext: What is the past tense of eat?", StatusCode::OK).await;

    let first = s
        .app
        .clone()
        .oneshot(post(
            "/chat",
            json!({"message": "She goes to school every day.", "mode": "grammar"}),
            None,
        ))
        .await
        .unwrap();
    let cookie = session_cookie(&first);
    assert_eq!(reply(first).await, "Correct!\nNext: What is the past tense of eat?");

    let opening = s.upstream.body(0)["messages"][1]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(opening.contains(chatptk_tutor::GRAMMAR_ITEM.question));

    s.app
        .oneshot(post("/chat", json!({"message": "ate", "mode": "grammar"}), Some(&cookie)))
        .await
        .unwrap();

    let recap = s.upstream.body(1)["messages"][1]["content"]
        .as_str()
        .unwrap()
        .to_string();
    assert!(recap.starts_with("Previous question: Next: What is the past tense of eat?"));
    assert!(recap.contains("Student answer: ate"));
}

#[tokio::test]
async fn e2e_stream_relays_upstream_fragments() {
    let s = stack("Great job! Is this sentence correct?", StatusCode::OK).await;
    let response = s
        .app
        .oneshot(post(
            "/stream",
            json!({"message": "She goes to school every day.", "mode": "grammar"}),
            None,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key(header::SET_COOKIE));
    assert_eq!(text(response).await, "Great job! Is this sentence correct?");
    assert_eq!(s.upstream.body(0)["stream"], true);
}

#[tokio::test]
async fn e2e_upstream_error_becomes_apology() {
    let s = stack("unused", StatusCode::INTERNAL_SERVER_ERROR).await;

    let response = s
        .app
        .clone()
        .oneshot(post("/chat", json!({"message": "Tell me about Manila", "mode": "conversation"}), None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(reply(response).await, chatptk_tutor::APOLOGY);

    let response = s
        .app
        .oneshot(post("/stream", json!({"message": "Tell me about Manila"}), None))
        .await
        .unwrap();
    assert_eq!(text(response).await, chatptk_tutor::APOLOGY);
    assert_eq!(s.upstream.calls(), 2);
}

#[tokio::test]
async fn e2e_stream_error_event_ends_with_apology() {
    let s = stack_with_sse(
        "unused",
        StatusCode::OK,
        Some(concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Once \"},\"finish_reason\":null}]}\n\n",
            "data: {\"error\":{\"message\":\"model overloaded\",\"type\":\"server_error\"}}\n\n",
        )),
    )
    .await;
    let response = s
        .app
        .oneshot(post("/stream", json!({"message": "Tell me a story"}), None))
        .await
        .unwrap();

    assert_eq!(text(response).await, format!("Once {}", chatptk_tutor::APOLOGY));
}

#[tokio::test]
async fn e2e_stream_garbage_ends_with_apology() {
    let s = stack_with_sse("unused", StatusCode::OK, Some("data: {not json\n\ndata: [DONE]\n\n")).await;
    let response = s
        .app
        .oneshot(post("/stream", json!({"message": "Tell me a story"}), None))
        .await
        .unwrap();

    assert_eq!(text(response).await, chatptk_tutor::APOLOGY);
}

#[tokio::test]
async fn e2e_empty_message_rejected() {
    let s = stack("unused", StatusCode::OK).await;
    let response = s
        .app
        .oneshot(post("/chat", json!({"message": "  "}), None))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json: Value = serde_json::from_str(&text(response).await).unwrap();
    assert_eq!(json, json!({"error": "Empty message"}));
    assert_eq!(s.upstream.calls(), 0);
}

// ── E2E: Startup ─────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_gateway_refuses_to_start_without_secrets() {
    let err = chatptk_gateway::start(AppConfig::default()).await.unwrap_err();
    assert!(err.to_string().contains("PTK_API_K"));
}
