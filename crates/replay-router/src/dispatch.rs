use std::collections::BTreeMap;

use serde_json::{json, Value};
use tracing::debug;

use traceview_core_types::{SessionId, TraceId};

use crate::errors::{RouteError, RouteResult};
use crate::router::{ResolvedResource, TraceRouter};

const CACHE_FOREVER: &str = "public, max-age=31536000";

/// Request as seen by the router.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteRequest {
    /// A path under the router's own scope, e.g. `/snapshot/<frame>`.
    Scoped {
        session: SessionId,
        path: String,
        params: BTreeMap<String, String>,
    },
    /// Any other URL the replayed page asked for.
    Resource { session: SessionId, url: String },
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RouteResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl RouteResponse {
    pub fn empty(status: u16) -> Self {
        Self {
            status,
            ..Self::default()
        }
    }

    fn json(status: u16, value: &Value) -> Self {
        let mut response = Self {
            status,
            headers: Vec::new(),
            body: value.to_string().into_bytes(),
        };
        response.set_header("Content-Type", "application/json");
        response
    }

    fn error(err: &RouteError) -> Self {
        Self::json(err.status_code(), &json!({ "error": err.to_string() }))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// Replaces every header called `name`, ignoring ASCII case.
    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.remove_header(name);
        self.headers.push((name.to_string(), value.into()));
    }

    pub fn remove_header(&mut self, name: &str) {
        self.headers.retain(|(key, _)| !key.eq_ignore_ascii_case(name));
    }
}

impl TraceRouter {
    pub async fn dispatch(&self, request: RouteRequest) -> RouteResponse {
        match request {
            RouteRequest::Scoped {
                session,
                path,
                params,
            } => self.dispatch_scoped(&session, &path, &params).await,
            RouteRequest::Resource { session, url } => {
                match self.resource_by_url(&session, &url).await {
                    Ok(Some(resource)) => resource_response(resource),
                    Ok(None) => RouteResponse::empty(404),
                    Err(err) => RouteResponse::error(&err),
                }
            }
        }
    }

    async fn dispatch_scoped(
        &self,
        session: &SessionId,
        path: &str,
        params: &BTreeMap<String, String>,
    ) -> RouteResponse {
        debug!(session = %session, path, "scoped request");
        if path == "/ping" {
            self.gc().await;
            return RouteResponse::empty(200);
        }
        if let Some(sha1) = path.strip_prefix("/sha1/") {
            return match self.resource_by_sha1(sha1).await {
                Ok(Some(body)) => RouteResponse {
                    status: 200,
                    headers: Vec::new(),
                    body,
                },
                Ok(None) => RouteResponse::empty(404),
                Err(err) => RouteResponse::error(&err),
            };
        }

        let trace = match trace_param(params) {
            Ok(trace) => trace,
            Err(err) => return RouteResponse::error(&err),
        };

        if path == "/context" {
            return match self.context(session, &trace).await {
                Ok(context) => match serde_json::to_value(context.as_ref()) {
                    Ok(value) => RouteResponse::json(200, &value),
                    Err(err) => RouteResponse::json(500, &json!({ "error": err.to_string() })),
                },
                // Unknown traces are 404; failed loads are 500 with the reason.
                Err(err) => RouteResponse::error(&err),
            };
        }

        let name = params.get("name").map(String::as_str).unwrap_or_default();
        if let Some(frame) = path.strip_prefix("/snapshotSize/") {
            return match self.snapshot_size(session, &trace, frame, name).await {
                Ok(viewport) => {
                    let body = match viewport {
                        Some(viewport) => {
                            json!({ "width": viewport.width, "height": viewport.height })
                        }
                        None => json!({}),
                    };
                    let mut response = RouteResponse::json(200, &body);
                    response.set_header("Cache-Control", CACHE_FOREVER);
                    response
                }
                Err(err) => RouteResponse::error(&err),
            };
        }
        if let Some(frame) = path.strip_prefix("/snapshot/") {
            return match self.snapshot(session, &trace, frame, name).await {
                Ok(rendered) => {
                    let mut response = RouteResponse {
                        status: 200,
                        headers: Vec::new(),
                        body: rendered.html.into_bytes(),
                    };
                    response.set_header("Content-Type", "text/html");
                    response
                }
                Err(err) => RouteResponse::error(&err),
            };
        }
        RouteResponse::empty(404)
    }
}

fn trace_param(params: &BTreeMap<String, String>) -> RouteResult<TraceId> {
    params
        .get("trace")
        .filter(|trace| !trace.is_empty())
        .map(|trace| TraceId::from(trace.as_str()))
        .ok_or_else(|| RouteError::BadRequest("missing trace parameter".into()))
}

fn is_text_mime(mime: &str) -> bool {
    let mime = mime.trim_start().to_ascii_lowercase();
    mime.starts_with("text/")
        || mime.starts_with("application/javascript")
        || mime.starts_with("application/json")
}

fn resource_response(resource: ResolvedResource) -> RouteResponse {
    let ResolvedResource { record, body } = resource;
    let response = &record.response;

    let mut content_type = response.content.mime_type.clone();
    if is_text_mime(&content_type) && !content_type.contains("charset") {
        content_type.push_str("; charset=utf-8");
    }

    let status = u16::try_from(response.status)
        .ok()
        .filter(|status| (100..=599).contains(status))
        .unwrap_or(200);
    let null_body = matches!(status, 101 | 204 | 205 | 304);
    let body = if null_body { Vec::new() } else { body };

    let mut out = RouteResponse {
        status,
        headers: Vec::new(),
        body,
    };
    out.set_header("Content-Type", content_type);
    for header in &response.headers {
        out.set_header(&header.name, header.value.clone());
    }
    out.remove_header("Content-Encoding");
    out.set_header("Access-Control-Allow-Origin", "*");
    out.set_header("Content-Length", out.body.len().to_string());
    out.set_header("Cache-Control", CACHE_FOREVER);
    out
}
