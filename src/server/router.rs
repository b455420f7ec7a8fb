use std::collections::BTreeMap;

use axum::{
    body::Body,
    extract::{Path, Query, State},
    http::{header::HeaderName, HeaderMap, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tower_http::cors::{Any, CorsLayer};
use tracing::warn;

use traceview_core_types::SessionId;
use traceview_replay_router::{RouteRequest, RouteResponse};

use super::state::ServeState;

pub const SESSION_HEADER: &str = "x-trace-session";
const SESSION_PARAM: &str = "session";

pub fn build_router(state: ServeState) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/livez", get(live_handler))
        .route("/trace/*path", get(trace_handler))
        .route("/resource", get(resource_handler))
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::OPTIONS])
        .allow_headers(Any)
}

async fn health_handler(State(state): State<ServeState>) -> Json<Value> {
    let snapshot = state.health_snapshot();
    Json(json!({
        "status": "ok",
        "live": snapshot.live,
        "ready": snapshot.ready,
        "started_at": snapshot.started_at,
        "loaded_traces": snapshot.loaded_traces,
        "active_sessions": snapshot.active_sessions,
        "tracked_sessions": state.leases.len(),
    }))
}

async fn live_handler(State(state): State<ServeState>) -> impl IntoResponse {
    let snapshot = state.health.snapshot();
    let status = if snapshot.live {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(json!({ "live": snapshot.live, "ready": snapshot.ready })))
}

async fn trace_handler(
    State(state): State<ServeState>,
    Path(path): Path<String>,
    Query(mut params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let session = session_of(&mut params, &headers);
    state.leases.touch(&session);
    let request = RouteRequest::Scoped {
        session,
        path: format!("/{}", path.trim_start_matches('/')),
        params,
    };
    into_response(state.router.dispatch(request).await)
}

async fn resource_handler(
    State(state): State<ServeState>,
    Query(mut params): Query<BTreeMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let session = session_of(&mut params, &headers);
    state.leases.touch(&session);
    let Some(url) = params.remove("url").filter(|url| !url.is_empty()) else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "missing url parameter" })),
        )
            .into_response();
    };
    into_response(
        state
            .router
            .dispatch(RouteRequest::Resource { session, url })
            .await,
    )
}

/// Session from the `session` query parameter, then the session header.
/// Requests carrying neither get a fresh anonymous session.
fn session_of(params: &mut BTreeMap<String, String>, headers: &HeaderMap) -> SessionId {
    if let Some(session) = params.remove(SESSION_PARAM).filter(|s| !s.is_empty()) {
        return SessionId(session);
    }
    headers
        .get(SESSION_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(SessionId::from)
        .unwrap_or_default()
}

fn into_response(route: RouteResponse) -> Response {
    let status = StatusCode::from_u16(route.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = Response::new(Body::from(route.body));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    for (name, value) in route.headers {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(&value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.append(name, value);
            }
            _ => warn!(header = %name, "dropping unrepresentable response header"),
        }
    }
    response
}
