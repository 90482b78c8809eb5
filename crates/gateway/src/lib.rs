//! HTTP API gateway for docq.
//!
//! Exposes the completion endpoint the browser UI talks to, plus a health
//! check. Built on Axum for high performance async HTTP.
//!
//! Security layers applied:
//! - CORS with an explicit origin for the browser UI
//! - Request body size limit (1 MB)
//! - In-memory rate limiting per client (`/health` exempt)
//! - HTTP trace logging

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::DefaultBodyLimit;
use axum::{
    Router,
    body::Body,
    extract::State,
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Json, Response},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use docq_context::TokenCounter;
use docq_core::{Error, RawMessage};
use docq_pipeline::{ChatPipeline, PipelineSettings};

/// Shared application state for the gateway.
pub struct GatewayState {
    pub pipeline: Arc<ChatPipeline>,
    pub started_at: chrono::DateTime<chrono::Utc>,
}

type SharedState = Arc<GatewayState>;

/// Build the Axum router with all gateway routes.
pub fn build_router(state: SharedState, config: &docq_config::GatewayConfig) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(tower_http::cors::AllowOrigin::exact(
            config
                .allowed_origin
                .parse()
                .expect("gateway.allowed_origin must be a valid origin"),
        ))
        .allow_methods([axum::http::Method::GET, axum::http::Method::POST])
        .allow_headers([axum::http::header::CONTENT_TYPE])
        .max_age(Duration::from_secs(3600));

    let rate_limiter = Arc::new(RateLimiter::new(
        config.rate_limit_per_minute,
        Duration::from_secs(60),
    ));

    Router::new()
        .route("/health", get(health_handler))
        .route("/v1/completion", post(completion_handler))
        .with_state(state)
        .layer(DefaultBodyLimit::max(1024 * 1024)) // 1 MB body limit
        .layer(middleware::from_fn(move |req, next| {
            let limiter = rate_limiter.clone();
            rate_limit_middleware(limiter, req, next)
        }))
        .layer(cors)
        .layer(tower_http::trace::TraceLayer::new_for_http())
}

/// Start the gateway HTTP server.
///
/// Builds the model clients, tokenizer, and pipeline ONCE and shares them
/// via Arc across all requests.
pub async fn start(config: docq_config::AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    if config.retrieval.index_url.is_empty() {
        return Err("retrieval.index_url is not configured — set it or DOCQ_INDEX_URL".into());
    }
    if !config.has_api_key() {
        return Err("no API key configured — set api_key or OPENAI_API_KEY".into());
    }

    let addr = format!("{}:{}", config.gateway.host, config.gateway.port);

    // === Build shared subsystems ONCE ===
    let openai = docq_providers::build_from_config(&config);
    let index = docq_retrieval::build_from_config(&config);
    let counter = TokenCounter::shared(&config.model);

    let pipeline = Arc::new(ChatPipeline::new(
        openai.clone(),
        openai.clone(),
        openai,
        index,
        counter,
        PipelineSettings::from_config(&config),
    ));

    let state = Arc::new(GatewayState {
        pipeline,
        started_at: chrono::Utc::now(),
    });

    let app = build_router(state, &config.gateway);

    info!(addr = %addr, model = %config.model, "gateway starting");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}

// --- Rate Limiter ---

/// Sliding-window rate limiter keyed by client address.
struct RateLimiter {
    max_requests: usize,
    window: Duration,
    clients: std::sync::Mutex<HashMap<String, VecDeque<Instant>>>,
}

impl RateLimiter {
    fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            max_requests,
            window,
            clients: std::sync::Mutex::new(HashMap::new()),
        }
    }

    /// Check if the client is within rate limits. Returns `true` if allowed.
    fn check(&self, client_key: &str) -> bool {
        let now = Instant::now();
        let mut clients = self.clients.lock().unwrap_or_else(|e| e.into_inner());

        let timestamps = clients.entry(client_key.to_string()).or_default();
        while timestamps
            .front()
            .is_some_and(|t| now.duration_since(*t) >= self.window)
        {
            timestamps.pop_front();
        }

        if timestamps.len() >= self.max_requests {
            return false;
        }

        timestamps.push_back(now);
        true
    }
}

/// Rate limiting middleware keyed by the client's peer address. `/health`
/// is exempt so monitoring can poll it freely.
async fn rate_limit_middleware(
    limiter: Arc<RateLimiter>,
    req: axum::extract::Request,
    next: Next,
) -> Result<Response, StatusCode> {
    if req.uri().path() == "/health" {
        return Ok(next.run(req).await);
    }

    let client_key = req
        .extensions()
        .get::<axum::extract::ConnectInfo<std::net::SocketAddr>>()
        .map(|info| info.0.ip().to_string())
        .unwrap_or_else(|| "anonymous".to_string());

    if !limiter.check(&client_key) {
        warn!(client = %client_key, "rate limit exceeded");
        return Err(StatusCode::TOO_MANY_REQUESTS);
    }

    Ok(next.run(req).await)
}

// --- Handlers ---

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    version: &'static str,
    uptime_secs: i64,
}

async fn health_handler(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: (chrono::Utc::now() - state.started_at).num_seconds(),
    })
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CompletionRequestBody {
    messages: Vec<RawMessage>,

    /// Which documentation set to answer from
    #[serde(default)]
    frontend_variant: Option<String>,

    /// Stream raw completion bytes instead of returning JSON
    #[serde(default)]
    stream: bool,
}

#[derive(Serialize)]
struct CompletionResponseBody {
    message: String,
}

#[derive(Serialize)]
struct ErrorResponse {
    error: String,
}

/// `POST /v1/completion` — answer a documentation question.
///
/// Returns `{"message": ...}` by default, or a streamed raw byte body of
/// completion text when `stream` is set. Client disconnection drops the
/// body stream, which propagates as cancellation all the way to the
/// upstream completion read.
async fn completion_handler(
    State(state): State<SharedState>,
    Json(payload): Json<CompletionRequestBody>,
) -> Result<Response, (StatusCode, Json<ErrorResponse>)> {
    if payload.messages.is_empty() {
        return Err(bad_request("messages must not be empty"));
    }

    let request_id = uuid::Uuid::new_v4();
    info!(
        %request_id,
        messages = payload.messages.len(),
        variant = payload.frontend_variant.as_deref().unwrap_or("-"),
        stream = payload.stream,
        "completion request"
    );

    let variant = payload.frontend_variant.as_deref();

    if payload.stream {
        let rx = state
            .pipeline
            .answer_stream(&payload.messages, variant)
            .await
            .map_err(reject)?;

        let body = Body::from_stream(ReceiverStream::new(rx).map(|item| {
            item.map(axum::body::Bytes::from)
                .map_err(std::io::Error::other)
        }));

        let response = Response::builder()
            .status(StatusCode::OK)
            .header(
                axum::http::header::CONTENT_TYPE,
                "text/plain; charset=utf-8",
            )
            .body(body)
            .map_err(|e| {
                error!(%request_id, error = %e, "failed to build streaming response");
                internal_error()
            })?;
        return Ok(response);
    }

    let message = state
        .pipeline
        .answer(&payload.messages, variant)
        .await
        .map_err(reject)?;

    Ok((StatusCode::OK, Json(CompletionResponseBody { message })).into_response())
}

/// Map pipeline errors to HTTP responses.
fn reject(err: Error) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &err {
        Error::InvalidRole { .. } | Error::ContentRejected => StatusCode::BAD_REQUEST,
        Error::BudgetExhausted { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        Error::Upstream(_) => StatusCode::BAD_GATEWAY,
        Error::Config { .. } | Error::Serialization(_) | Error::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    if status.is_server_error() {
        error!(error = %err, "completion request failed");
    } else {
        warn!(error = %err, "completion request rejected");
    }
    (
        status,
        Json(ErrorResponse {
            error: err.to_string(),
        }),
    )
}

fn bad_request(message: &str) -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::BAD_REQUEST,
        Json(ErrorResponse {
            error: message.to_string(),
        }),
    )
}

fn internal_error() -> (StatusCode, Json<ErrorResponse>) {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ErrorResponse {
            error: "internal error".to_string(),
        }),
    )
}
