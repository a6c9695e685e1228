//! HTTP front end.
//!
//! Every method on `/` is turned into a [`GatewayRequest`] and handed to the
//! dispatcher; the gateway response is written back as-is.

use std::collections::HashMap;
use std::sync::Arc;

use anyhow::{Context, Result};
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, RawQuery, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{Json, Router};
use serde_json::json;
use tokio::net::TcpListener;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::{info, Level};

use crate::core::Dispatcher;
use crate::ingest::{GatewayRequest, GatewayResponse, RequestBody};

pub fn create_router(dispatcher: Arc<Dispatcher>, max_body_bytes: usize) -> Router {
    let trace_layer = TraceLayer::new_for_http()
        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
        .on_response(DefaultOnResponse::new().level(Level::INFO));

    Router::new()
        .route("/", any(gateway_handler))
        .route("/health", get(health_handler))
        .layer(DefaultBodyLimit::max(max_body_bytes))
        .layer(trace_layer)
        .with_state(dispatcher)
}

/// Bind `address` and serve until Ctrl-C
pub async fn serve(dispatcher: Arc<Dispatcher>, address: &str, max_body_bytes: usize) -> Result<()> {
    let listener = TcpListener::bind(address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    let local = listener.local_addr().context("Failed to read bound address")?;

    info!(address = %local, max_body_bytes, "Intake server listening");

    axum::serve(listener, create_router(dispatcher, max_body_bytes))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}

async fn health_handler() -> impl IntoResponse {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

async fn gateway_handler(
    State(dispatcher): State<Arc<Dispatcher>>,
    method: Method,
    headers: HeaderMap,
    RawQuery(query): RawQuery,
    body: Bytes,
) -> Response {
    let request = gateway_request(&method, &headers, query.as_deref(), body);
    into_http_response(dispatcher.handle(&request).await)
}

/// Build the gateway view of an HTTP request
pub fn gateway_request(
    method: &Method,
    headers: &HeaderMap,
    query: Option<&str>,
    body: Bytes,
) -> GatewayRequest {
    // Non-UTF-8 header values are dropped
    let headers: HashMap<String, String> = headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();

    let query_string_parameters: HashMap<String, String> = query
        .map(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .into_owned()
                .collect()
        })
        .unwrap_or_default();

    let body = if body.is_empty() {
        RequestBody::Empty
    } else {
        RequestBody::Binary(body.to_vec())
    };

    GatewayRequest {
        http_method: Some(method.as_str().to_string()),
        headers,
        query_string_parameters,
        body,
        is_base64_encoded: false,
    }
}

fn into_http_response(response: GatewayResponse) -> Response {
    let status =
        StatusCode::from_u16(response.status_code).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut http = (status, response.body).into_response();

    for (name, value) in &response.headers {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            http.headers_mut().insert(name, value);
        }
    }

    http
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_request_from_http_parts() {
        let mut headers = HeaderMap::new();
        headers.insert("content-type", HeaderValue::from_static("audio/ogg"));

        let request = gateway_request(
            &Method::GET,
            &headers,
            Some("action=list&type=note%20s"),
            Bytes::from_static(b"OggS"),
        );

        assert_eq!(request.method(), "GET");
        assert_eq!(request.header("Content-Type"), Some("audio/ogg"));
        assert_eq!(request.query_param("action"), Some("list"));
        assert_eq!(request.query_param("type"), Some("note s"));
        assert_eq!(request.body, RequestBody::Binary(b"OggS".to_vec()));
        assert!(!request.is_base64_encoded);
    }

    #[test]
    fn test_empty_body_is_empty() {
        let request = gateway_request(&Method::POST, &HeaderMap::new(), None, Bytes::new());
        assert_eq!(request.body, RequestBody::Empty);
        assert!(request.query_string_parameters.is_empty());
    }
}
