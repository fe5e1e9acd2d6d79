use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::engine::QueryEngine;
use crate::routes::{HttpRequest, HttpResponse, handle_request};
use crate::service::LeaderboardService;

/// HTTP-API style invocation event. Only the fields routing needs are read.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayEvent {
    #[serde(default)]
    pub raw_path: Option<String>,
    #[serde(default)]
    pub request_context: RequestContext,
    #[serde(default)]
    pub query_string_parameters: Option<HashMap<String, String>>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestContext {
    #[serde(default)]
    pub http: HttpContext,
    #[serde(default)]
    pub request_id: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HttpContext {
    #[serde(default)]
    pub method: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayResponse {
    pub status_code: u16,
    pub headers: BTreeMap<String, String>,
    pub body: String,
}

impl From<HttpResponse> for GatewayResponse {
    fn from(response: HttpResponse) -> Self {
        Self {
            status_code: response.status,
            headers: response
                .headers()
                .into_iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
            body: response.body,
        }
    }
}

impl GatewayEvent {
    pub fn to_request(&self) -> HttpRequest {
        let path = if self.request_context.http.path.is_empty() {
            self.raw_path.clone().unwrap_or_default()
        } else {
            self.request_context.http.path.clone()
        };
        HttpRequest {
            method: self.request_context.http.method.to_ascii_uppercase(),
            path,
            query: self.query_string_parameters.clone().unwrap_or_default(),
            request_id: self.request_context.request_id.clone(),
        }
    }
}

pub fn handle_gateway_event<E: QueryEngine>(
    service: &LeaderboardService<E>,
    event: &GatewayEvent,
) -> GatewayResponse {
    tracing::debug!(
        request_id = event.request_context.request_id.as_deref().unwrap_or("unknown"),
        "gateway event received"
    );
    handle_request(service, &event.to_request()).into()
}
