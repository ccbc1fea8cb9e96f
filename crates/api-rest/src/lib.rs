//! # API REST
//!
//! HTTP surface of the KYC runtime.
//!
//! Handles:
//! - `POST /invocations`: screening runs (JSON) and assistant turns (server-sent events)
//! - `GET /ping`: runtime health
//! - OpenAPI/Swagger documentation
//!
//! Uses `api-shared` for wire types and `kyc-core` for everything behind the handlers.

#![warn(rust_2018_idioms)]

use api_shared::{
    HealthService, InvocationInput, InvocationReq, InvocationRes, InvocationTarget, PingRes,
    MISSING_INPUT_ERROR, SESSION_HEADER,
};
use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, Sse},
        IntoResponse, Json, Response,
    },
    routing::{get, post},
    Router,
};
use futures_util::StreamExt;
use kyc_core::{
    select_classifier, AgentMode, Assistant, CaseStore, CaseUpdateWriter, ChatModel, CoreConfig,
    CrewInput, KycError, ObjectStore, OpenAiChatModel, ScreeningCrew, SearchProvider, Secrets,
    StaticSearch, TavilySearch,
};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tracing::Instrument;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Shared state for the runtime handlers.
#[derive(Clone)]
pub struct AppState {
    crew: Arc<ScreeningCrew>,
    /// Present only in assistant mode.
    assistant: Option<Assistant>,
}

impl AppState {
    pub fn new(crew: ScreeningCrew, assistant: Option<Assistant>) -> Self {
        Self {
            crew: Arc::new(crew),
            assistant,
        }
    }

    /// Wires the runtime services from configuration, stores and loaded secrets.
    ///
    /// Missing keys degrade rather than fail: without an OpenAI key the keyword classifier is
    /// used and assistant mode falls back to screening; without a Tavily key every search
    /// fails, which yields `AMBIGUOUS` outcomes.
    pub fn build(
        cfg: Arc<CoreConfig>,
        cases: Arc<dyn CaseStore>,
        objects: Arc<dyn ObjectStore>,
        secrets: &Secrets,
    ) -> Self {
        let model: Option<Arc<dyn ChatModel>> = secrets.openai_api_key().and_then(|key| {
            match OpenAiChatModel::new(cfg.openai_base_url(), key, cfg.model()) {
                Ok(model) => Some(Arc::new(model) as Arc<dyn ChatModel>),
                Err(e) => {
                    tracing::warn!("chat model unavailable: {}", e);
                    None
                }
            }
        });

        let search: Arc<dyn SearchProvider> = match secrets
            .tavily_api_key()
            .map(|key| TavilySearch::new(cfg.tavily_base_url(), key))
        {
            Some(Ok(search)) => Arc::new(search),
            Some(Err(e)) => {
                tracing::warn!("web search unavailable: {}", e);
                Arc::new(StaticSearch::failing(&e.to_string()))
            }
            None => {
                tracing::warn!("no search API key configured; screenings will need manual review");
                Arc::new(StaticSearch::failing("no search API key configured"))
            }
        };

        let classifier = select_classifier(cfg.classifier(), model.clone());
        let writer = CaseUpdateWriter::new(cfg.clone(), cases.clone(), objects);
        let crew = ScreeningCrew::new(cases, search, classifier, writer);

        let assistant = match (cfg.agent_mode(), model) {
            (AgentMode::Assistant, Some(model)) => Some(Assistant::new(model)),
            (AgentMode::Assistant, None) => {
                tracing::warn!("assistant mode needs a chat model; serving screenings only");
                None
            }
            (AgentMode::Screening, _) => None,
        };

        Self::new(crew, assistant)
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(invocations, ping),
    components(schemas(InvocationReq, InvocationInput, InvocationRes, PingRes))
)]
struct ApiDoc;

/// Builds the runtime router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/invocations", post(invocations))
        .route("/ping", get(ping))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

#[utoipa::path(
    get,
    path = "/ping",
    responses(
        (status = 200, description = "Runtime is healthy", body = PingRes)
    )
)]
/// Health check endpoint
///
/// # Returns
/// * `Json<PingRes>` - `{"status": "Healthy"}`
#[axum::debug_handler]
async fn ping(State(_state): State<AppState>) -> Json<PingRes> {
    Json(HealthService::check_health())
}

#[utoipa::path(
    post,
    path = "/invocations",
    request_body = InvocationReq,
    responses(
        (status = 200, description = "Screening result, or an event stream in assistant mode", body = InvocationRes),
        (status = 400, description = "Nothing to screen in payload", body = InvocationRes),
        (status = 422, description = "Screening could not run for this input", body = InvocationRes),
        (status = 500, description = "Internal error", body = InvocationRes)
    )
)]
/// Runs one invocation
///
/// The body may be a JSON object or a JSON string holding one. A case id runs a case
/// screening; text runs a name screening, or an assistant turn when the runtime is in
/// assistant mode.
///
/// # Returns
/// * `{"result": raw}` on success, or `text/event-stream` chunks for assistant turns
/// * `{"error": message}` otherwise
///
/// # Errors
/// Returns `400 Bad Request` if the payload is not JSON or names nothing to screen, `422` if
/// the case lookup fails, and `500` for anything else.
#[axum::debug_handler]
async fn invocations(State(state): State<AppState>, headers: HeaderMap, body: Bytes) -> Response {
    let session_id = headers
        .get(SESSION_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());

    let span = tracing::info_span!("invocation", session_id = %session_id);
    let mut response = handle_invocation(state, body).instrument(span).await;

    if let (Ok(name), Ok(value)) = (
        HeaderName::from_bytes(SESSION_HEADER.as_bytes()),
        HeaderValue::from_str(&session_id),
    ) {
        response.headers_mut().insert(name, value);
    }
    response
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (status, Json(InvocationRes::error(message))).into_response()
}

fn error_status(e: &KycError) -> StatusCode {
    match e {
        KycError::InvalidInput(_) | KycError::Text(_) => StatusCode::BAD_REQUEST,
        KycError::Tool(_) => StatusCode::UNPROCESSABLE_ENTITY,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

async fn handle_invocation(state: AppState, body: Bytes) -> Response {
    let payload: Value = match serde_json::from_slice(&body) {
        Ok(payload) => payload,
        Err(e) => {
            tracing::warn!("invocation body is not JSON: {}", e);
            return error_response(StatusCode::BAD_REQUEST, format!("Invalid JSON payload: {}", e));
        }
    };

    let Some(target) = InvocationTarget::from_payload(&payload) else {
        tracing::warn!("invocation payload names nothing to screen");
        return error_response(StatusCode::BAD_REQUEST, MISSING_INPUT_ERROR);
    };

    let input = match (target, &state.assistant) {
        (InvocationTarget::Prompt(prompt), Some(assistant)) => {
            return stream_answer(assistant, &prompt).await;
        }
        (InvocationTarget::Prompt(name), None) => CrewInput::Name(name),
        (InvocationTarget::Case(case_id), _) => CrewInput::Case(case_id),
    };

    match state.crew.kickoff(input).await {
        Ok(output) => Json(InvocationRes::result(output.raw)).into_response(),
        Err(e) => {
            tracing::error!("screening failed: {}", e);
            error_response(error_status(&e), e.to_string())
        }
    }
}

async fn stream_answer(assistant: &Assistant, prompt: &str) -> Response {
    let stream = match assistant.stream(prompt).await {
        Ok(stream) => stream,
        Err(e) => {
            tracing::error!("assistant failed to start: {}", e);
            return error_response(StatusCode::BAD_GATEWAY, e.to_string());
        }
    };

    let events = stream.map(|chunk| {
        let event = match chunk {
            Ok(text) => Event::default().data(text.replace('\r', "")),
            Err(e) => {
                tracing::error!("assistant stream failed: {}", e);
                Event::default().event("error").data(e.to_string().replace('\r', ""))
            }
        };
        Ok::<_, Infallible>(event)
    });
    Sse::new(events).into_response()
}
