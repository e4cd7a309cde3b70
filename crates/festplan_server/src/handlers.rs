//! Plan data and static asset handlers.
//!
//! # Responsibility
//! - Map the versioned read/write paths onto conditional HTTP semantics
//!   (`If-None-Match`/`ETag` for polling, `If-Match` for guarded saves).
//!
//! # Invariants
//! - A body that is not valid JSON is rejected before any storage access.
//! - Conflict responses perform no mutation and tell the client to refresh.

use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path as UrlPath, State};
use axum::http::header::{self, HeaderName};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use festplan_core::{PlanDocument, ReadOutcome};
use log::{error, warn};
use serde_json::json;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

/// Liveness probe.
pub async fn healthz() -> Response {
    Json(json!({"status": "ok"})).into_response()
}

/// `GET /api/data`: full document, or 304 against the client's cached
/// version.
pub async fn get_data(State(state): State<AppState>, headers: HeaderMap) -> Response {
    let client_version = header_token(&headers, header::IF_NONE_MATCH);

    let service = Arc::clone(&state.service);
    let outcome =
        tokio::task::spawn_blocking(move || service.read(client_version.as_deref())).await;

    match outcome {
        Ok(ReadOutcome::NotModified { version }) => {
            with_etag(StatusCode::NOT_MODIFIED.into_response(), &version)
        }
        Ok(ReadOutcome::Document { document, version }) => {
            with_etag(Json(document).into_response(), &version)
        }
        Err(err) => {
            error!("event=http_get_data module=server status=error error=join error_detail={err}");
            storage_error()
        }
    }
}

/// `POST /api/data`: guarded wholesale replacement of the plan.
pub async fn post_data(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let document: PlanDocument = match serde_json::from_slice(&body) {
        Ok(document) => document,
        Err(err) => {
            warn!("event=http_post_data module=server status=rejected reason=invalid_json error={err}");
            return (
                StatusCode::BAD_REQUEST,
                Json(json!({"error": "Invalid JSON body"})),
            )
                .into_response();
        }
    };

    let expected_version = header_token(&headers, header::IF_MATCH);

    let service = Arc::clone(&state.service);
    let result =
        tokio::task::spawn_blocking(move || service.write(&document, expected_version.as_deref()))
            .await;

    match result {
        Ok(Ok(version)) => with_etag(
            (StatusCode::OK, Json(json!({"status": "success"}))).into_response(),
            &version,
        ),
        Ok(Err(err)) if err.is_conflict() => (
            StatusCode::CONFLICT,
            Json(json!({"error": "Data conflict. Please refresh."})),
        )
            .into_response(),
        Ok(Err(err)) => {
            error!("event=http_post_data module=server status=error error={err}");
            storage_error()
        }
        Err(err) => {
            error!("event=http_post_data module=server status=error error=join error_detail={err}");
            storage_error()
        }
    }
}

/// `GET /`: the single-page app shell.
pub async fn index(State(state): State<AppState>) -> Response {
    serve_file(state.static_dir.join("index.html")).await
}

/// `GET /static/*path`: frontend assets relative to the static directory.
pub async fn static_asset(
    State(state): State<AppState>,
    UrlPath(path): UrlPath<String>,
) -> Response {
    let Some(relative) = sanitize_asset_path(&path) else {
        return StatusCode::NOT_FOUND.into_response();
    };
    serve_file(state.static_dir.join(relative)).await
}

fn storage_error() -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({"status": "error"})),
    )
        .into_response()
}

/// Extracts a version token from a conditional header, tolerating quoted
/// and weak ETag forms.
fn header_token(headers: &HeaderMap, name: HeaderName) -> Option<String> {
    let raw = headers.get(name)?.to_str().ok()?.trim();
    let raw = raw.strip_prefix("W/").unwrap_or(raw);
    let token = raw.trim_matches('"').trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

fn with_etag(mut response: Response, version: &str) -> Response {
    if let Ok(value) = HeaderValue::from_str(version) {
        response.headers_mut().insert(header::ETAG, value);
    }
    response
}

fn sanitize_asset_path(path: &str) -> Option<PathBuf> {
    let candidate = Path::new(path);
    let mut clean = PathBuf::new();
    for component in candidate.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            _ => return None,
        }
    }
    if clean.as_os_str().is_empty() {
        None
    } else {
        Some(clean)
    }
}

async fn serve_file(path: PathBuf) -> Response {
    match tokio::fs::read(&path).await {
        Ok(bytes) => (
            [(header::CONTENT_TYPE, mime_for_path(&path))],
            bytes,
        )
            .into_response(),
        Err(err) => {
            warn!(
                "event=http_static module=server status=miss path={} error={err}",
                path.display()
            );
            StatusCode::NOT_FOUND.into_response()
        }
    }
}

fn mime_for_path(path: &Path) -> &'static str {
    match path.extension().and_then(|ext| ext.to_str()) {
        Some("html") => "text/html; charset=utf-8",
        Some("js") => "text/javascript",
        Some("css") => "text/css",
        Some("json") => "application/json",
        Some("png") => "image/png",
        Some("svg") => "image/svg+xml",
        Some("ico") => "image/x-icon",
        _ => "application/octet-stream",
    }
}
