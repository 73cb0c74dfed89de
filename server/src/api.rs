// Chat and search HTTP API
//
// `/api/chat` streams UI message events over SSE; `/api/search` answers with
// the structured search response.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, rejection::QueryRejection, Query, State},
    http::{HeaderName, HeaderValue, StatusCode},
    response::{
        sse::{Event, KeepAlive},
        IntoResponse, Response, Sse,
    },
    routing::{get, post},
    Json, Router,
};
use serde_json::json;
use tokio_stream::StreamExt;
use tower_http::cors::{Any, CorsLayer};
use tracing::{debug, warn};

use parley_core::search::{SearchParams, SearchResponse};
use parley_core::stream::{DONE_MARKER, UI_STREAM_HEADER, UI_STREAM_VERSION};
use parley_core::{ChatFailure, ChatRequest, ConversationRouter, SearchAggregator};

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub router: Arc<ConversationRouter>,
    pub search: Arc<SearchAggregator>,
}

impl AppState {
    pub fn new(router: ConversationRouter, search: SearchAggregator) -> Self {
        Self {
            router: Arc::new(router),
            search: Arc::new(search),
        }
    }
}

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/chat", post(chat_handler))
        .route("/api/search", get(search_handler))
        .route("/healthz", get(healthz_handler))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

fn failure_response(failure: ChatFailure) -> Response {
    let status = StatusCode::from_u16(failure.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    (status, Json(json!({ "error": failure.message }))).into_response()
}

async fn chat_handler(
    State(state): State<AppState>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Response {
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!(target: "server", error = %rejection.body_text(), "Rejected chat request body");
            return failure_response(ChatFailure::bad_request(rejection.body_text()));
        }
    };
    debug!(target: "server", model = %request.model, web_search = request.web_search, has_attachment = request.has_attachment, "POST /api/chat");

    let events = match state.router.route(request) {
        Ok(events) => events,
        Err(failure) => return failure_response(failure),
    };

    let stream = events
        .map(|event| Ok::<_, Infallible>(Event::default().data(event.to_json())))
        .chain(tokio_stream::once(Ok(Event::default().data(DONE_MARKER))));

    (
        [(
            HeaderName::from_static(UI_STREAM_HEADER),
            HeaderValue::from_static(UI_STREAM_VERSION),
        )],
        Sse::new(stream).keep_alive(KeepAlive::default()),
    )
        .into_response()
}

async fn search_handler(
    State(state): State<AppState>,
    params: Result<Query<SearchParams>, QueryRejection>,
) -> Response {
    let response = match params {
        Ok(Query(params)) => {
            debug!(target: "server", ?params, "GET /api/search");
            state.search.handle_params(&params).await
        }
        Err(rejection) => SearchResponse::failure(rejection.body_text()),
    };
    let status = if response.success {
        StatusCode::OK
    } else {
        StatusCode::BAD_REQUEST
    };
    (status, Json(response)).into_response()
}

async fn healthz_handler() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok" }))
}
