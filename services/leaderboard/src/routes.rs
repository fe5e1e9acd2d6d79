use std::collections::HashMap;

use percent_encoding::percent_decode_str;
use serde_json::json;
use tracing::{error, warn};

use crate::LeaderboardError;
use crate::engine::QueryEngine;
use crate::params::parse_params;
use crate::service::LeaderboardService;

pub const SERVICE_NAME: &str = "leaderboard-api";

pub const CORS_HEADERS: [(&str, &str); 4] = [
    ("Access-Control-Allow-Origin", "*"),
    ("Access-Control-Allow-Methods", "GET, OPTIONS"),
    ("Access-Control-Allow-Headers", "Content-Type, Authorization"),
    ("Access-Control-Max-Age", "300"),
];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: String,
    pub path: String,
    pub query: HashMap<String, String>,
    /// Invocation id assigned by the front end, echoed by the health check.
    pub request_id: Option<String>,
}

impl HttpRequest {
    /// Builds a request from a raw target such as `/leaderboard?kingdom=1`.
    pub fn from_target(method: &str, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method: method.to_string(),
            path,
            query,
            request_id: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: Option<&'static str>,
    pub body: String,
}

impl HttpResponse {
    fn ok_json(body: String) -> Self {
        Self {
            status: 200,
            content_type: Some("application/json"),
            body,
        }
    }

    fn error(status: u16, message: &str) -> Self {
        Self {
            status,
            content_type: Some("application/json"),
            body: json!({ "error": message }).to_string(),
        }
    }

    fn preflight() -> Self {
        Self {
            status: 200,
            content_type: None,
            body: String::new(),
        }
    }

    /// Response headers: content type, if any, followed by the CORS set.
    pub fn headers(&self) -> Vec<(&'static str, &'static str)> {
        let mut headers = Vec::with_capacity(CORS_HEADERS.len() + 1);
        if let Some(content_type) = self.content_type {
            headers.push(("Content-Type", content_type));
        }
        headers.extend(CORS_HEADERS);
        headers
    }
}

pub fn handle_request<E: QueryEngine>(
    service: &LeaderboardService<E>,
    request: &HttpRequest,
) -> HttpResponse {
    match (request.method.as_str(), request.path.as_str()) {
        ("OPTIONS", _) => HttpResponse::preflight(),
        (_, "/health") => HttpResponse::ok_json(
            json!({
                "status": "healthy",
                "service": SERVICE_NAME,
                "version": env!("CARGO_PKG_VERSION"),
                "request_id": request.request_id,
            })
            .to_string(),
        ),
        (_, "/leaderboard") => match leaderboard_response(service, &request.query) {
            Ok(body) => HttpResponse::ok_json(body),
            Err(err) => error_response(&err),
        },
        _ => HttpResponse::error(404, "Not found"),
    }
}

fn leaderboard_response<E: QueryEngine>(
    service: &LeaderboardService<E>,
    query: &HashMap<String, String>,
) -> Result<String, LeaderboardError> {
    let params = parse_params(query)?;
    let payload = service.leaderboard(&params)?;
    serde_json::to_string(&payload).map_err(|err| LeaderboardError::Encode(err.to_string()))
}

fn error_response(err: &LeaderboardError) -> HttpResponse {
    let status = err.status_code();
    if status >= 500 {
        error!(error = %err, "leaderboard request failed");
        HttpResponse::error(status, "Internal server error")
    } else {
        warn!(status, error = %err, "leaderboard request rejected");
        HttpResponse::error(status, &err.to_string())
    }
}

/// Splits a request target into its path and decoded query parameters. Pairs
/// that fail to decode are dropped; a repeated key keeps its last value.
pub fn split_target(target: &str) -> (String, HashMap<String, String>) {
    let (path, query_str) = target
        .split_once('?')
        .map(|(path, query)| (path, Some(query)))
        .unwrap_or((target, None));

    let mut query = HashMap::new();
    if let Some(query_str) = query_str {
        for pair in query_str.split('&') {
            if pair.is_empty() {
                continue;
            }
            let (raw_key, raw_value) = pair.split_once('=').unwrap_or((pair, ""));
            if let Some(key) = url_decode(raw_key)
                && let Some(value) = url_decode(raw_value)
            {
                query.insert(key, value);
            }
        }
    }
    (path.to_string(), query)
}

fn url_decode(raw: &str) -> Option<String> {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced)
        .decode_utf8()
        .ok()
        .map(|value| value.into_owned())
}
