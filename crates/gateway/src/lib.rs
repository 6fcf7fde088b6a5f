//! HTTP gateway for ChatPTK.
//!
//! Exposes the tutor over a small JSON API:
//!
//! - `POST /chat`   — whole reply as `{"reply": ...}`
//! - `POST /stream` — reply streamed as chunked `text/plain`
//! - `GET /`        — liveness text
//! - `GET /health`  — status and version
//!
//! Sessions are tracked with a signed cookie (see [`session`]).
//!
//! Built on Axum.

pub mod session;

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::{HeaderMap, HeaderValue, Method, StatusCode, header},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tracing::{info, warn};

use chatptk_core::error::ValidationError;
use chatptk_core::session::SessionStore;
use chatptk_memory::InMemorySessionStore;
use chatptk_tutor::{ChatRequest, TutorMode, TutorPipeline};

use crate::session::SessionCookies;

/// Request bodies above this size are rejected.
const BODY_LIMIT: usize = 64 * 1024;

/// How often idle sessions are swept.
const PURGE_INTERVAL: Duration = Duration::from_secs(60);

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: TutorPipeline,
    pub cookies: SessionCookies,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
///
/// `allowed_origins` empty means the request origin is mirrored back,
/// credentials included.
pub fn build_router(state: SharedState, allowed_origins: &[String]) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/health", get(health_handler))
        .route("/chat", post(chat_handler))
        .route("/stream", post(stream_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(BODY_LIMIT))
        .layer(cors_layer(allowed_origins))
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let origin = if allowed_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|o| match o.parse() {
                Ok(v) => Some(v),
                Err(_) => {
                    warn!(origin = %o, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600))
}

/// Start the gateway HTTP server.
///
/// Missing secrets are fatal: the server refuses to start.
pub async fn start(config: chatptk_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let secrets = config.require_secrets()?;
    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    let provider = chatptk_providers::build_from_config(&config, &secrets.api_key);
    let store = Arc::new(InMemorySessionStore::from_config(&config.session));
    let sessions: Arc<dyn SessionStore> = store.clone();
    let pipeline = TutorPipeline::from_config(&config, provider, sessions);
    let cookies = SessionCookies::from_config(&secrets.session_secret, &config.session)
        .map_err(|e| format!("Invalid session secret: {e}"))?;

    info!(
        provider = %config.provider,
        model = %config.model,
        students = pipeline.roster().len(),
        lessons = pipeline.lessons().len(),
        "Tutor pipeline ready"
    );

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(PURGE_INTERVAL);
        loop {
            ticker.tick().await;
            let purged = store.purge_expired().await;
            if purged > 0 {
                info!(purged, "Expired idle sessions");
            }
        }
    });

    let state = Arc::new(GatewayState { pipeline, cookies });
    let app = build_router(state, &config.gateway.allowed_origins);

    info!(addr = %addr, "Gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

// --- Handlers ---

/// Body of `POST /chat` and `POST /stream`.
#[derive(Debug, Deserialize)]
struct ChatBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    mode: Option<String>,
    #[serde(default)]
    student_id: Option<String>,
}

impl ChatBody {
    fn into_request(self) -> ChatRequest {
        ChatRequest {
            message: self.message,
            mode: TutorMode::parse(self.mode.as_deref()),
            student_id: self.student_id,
        }
    }
}

#[derive(Serialize)]
struct ChatResponse {
    reply: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
}

async fn root_handler() -> &'static str {
    "ChatPTK is running"
}

async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

fn rejected(e: ValidationError) -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
        .into_response()
}

async fn chat_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    let (session_id, set_cookie) = state.cookies.resolve(&headers);
    let request = body.into_request();
    info!(session = %session_id, mode = %request.mode, "Chat request");

    let mut response = match state.pipeline.chat(&session_id, &request).await {
        Ok(reply) => Json(ChatResponse { reply: reply.text }).into_response(),
        Err(e) => rejected(e),
    };
    session::attach(response.headers_mut(), set_cookie);
    response
}

async fn stream_handler(
    State(state): State<SharedState>,
    headers: HeaderMap,
    Json(body): Json<ChatBody>,
) -> Response {
    let (session_id, set_cookie) = state.cookies.resolve(&headers);
    let request = body.into_request();
    info!(session = %session_id, mode = %request.mode, "Stream request");

    let mut response = match state.pipeline.stream(&session_id, &request).await {
        Ok(stream) => (
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            Body::from_stream(stream.map(Ok::<_, Infallible>)),
        )
            .into_response(),
        Err(e) => rejected(e),
    };
    session::attach(response.headers_mut(), set_cookie);
    response
}
