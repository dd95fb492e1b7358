//! API (HTTP) plugins
//!
//! Vendor-agnostic outbound calls. The transport is a seam so tests run
//! against a scripted transport instead of the network; the default
//! transport is a shared reqwest client with a ten second timeout.

use crate::merge;
use crate::plugins::HttpPluginOutput;
use crate::transformer;
use async_trait::async_trait;
use caseflow_core::{ApiPluginSpec, HttpMethod, Value};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// A fully resolved outbound request
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub method: HttpMethod,
    pub headers: HashMap<String, String>,
    /// JSON body; `None` for bodyless methods
    pub body: Option<Value>,
    pub timeout: Duration,
}

/// Response as seen by the plugin
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Value,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Transport seam behind API plugins
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn execute(&self, request: HttpRequest) -> anyhow::Result<HttpResponse>;
}

/// Default transport backed by reqwest
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        ReqwestTransport {
            client: reqwest::Client::new(),
        }
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(&self, request: HttpRequest) -> anyhow::Result<HttpResponse> {
        let mut builder = match request.method {
            HttpMethod::GET => self.client.get(&request.url),
            HttpMethod::POST => self.client.post(&request.url),
            HttpMethod::PUT => self.client.put(&request.url),
            HttpMethod::DELETE => self.client.delete(&request.url),
            HttpMethod::PATCH => self.client.patch(&request.url),
        };

        builder = builder.timeout(request.timeout);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        if let Some(body) = &request.body {
            builder = builder.json(&body.to_json());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body: serde_json::Value = response.json().await.unwrap_or(serde_json::Value::Null);

        Ok(HttpResponse {
            status,
            body: Value::from(body),
        })
    }
}

/// An API plugin bound to its transport
pub struct ApiPlugin {
    pub spec: ApiPluginSpec,
    transport: Arc<dyn HttpTransport>,
}

impl ApiPlugin {
    pub fn new(spec: ApiPluginSpec, transport: Arc<dyn HttpTransport>) -> Self {
        ApiPlugin { spec, transport }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn state_names(&self) -> &[String] {
        &self.spec.state_names
    }

    /// Context path the response is persisted at
    pub fn persist_destination(&self) -> String {
        self.spec
            .persist_response_destination
            .clone()
            .unwrap_or_else(|| format!("pluginsOutput.{}", self.spec.name))
    }

    /// A follow-up event fires only when both success and error actions are
    /// declared; a lone success action is a persist-only configuration.
    pub fn has_callback(&self) -> bool {
        self.spec.success_action.is_some() && self.spec.error_action.is_some()
    }

    /// Resolve `{dotted.path}` placeholders from the invocation context,
    /// percent-encoding each substituted value
    pub fn interpolate_url(&self, context: &Value) -> String {
        let mut url = String::with_capacity(self.spec.url.len());
        let mut rest = self.spec.url.as_str();

        while let Some(open) = rest.find('{') {
            url.push_str(&rest[..open]);
            match rest[open..].find('}') {
                Some(close_offset) => {
                    let path = &rest[open + 1..open + close_offset];
                    let raw = match context.get_path(path) {
                        Some(Value::String(text)) => text.clone(),
                        Some(Value::Number(number)) => number.to_string(),
                        Some(Value::Bool(flag)) => flag.to_string(),
                        _ => String::new(),
                    };
                    url.push_str(&urlencoding::encode(&raw));
                    rest = &rest[open + close_offset + 1..];
                }
                None => {
                    url.push_str(&rest[open..]);
                    rest = "";
                }
            }
        }
        url.push_str(rest);
        url
    }

    /// Execute the call. Transport failures and non-2xx statuses land in
    /// the output's error field with the error action as callback.
    ///
    /// `additional_context` is overlaid on the invocation context for this
    /// call only; it is never persisted.
    pub async fn invoke(
        &self,
        context: &Value,
        additional_context: Option<&Value>,
    ) -> HttpPluginOutput {
        let overlaid;
        let context = match additional_context {
            Some(extra) => {
                overlaid = merge::deep_merge(extra, context);
                &overlaid
            }
            None => context,
        };

        let request_payload = if self.spec.request.is_empty() {
            None
        } else {
            Some(transformer::apply(&self.spec.request, context))
        };

        let body = match self.spec.method {
            HttpMethod::GET | HttpMethod::DELETE => None,
            _ => request_payload.clone(),
        };

        let request = HttpRequest {
            url: self.interpolate_url(context),
            method: self.spec.method,
            headers: self.spec.headers.clone(),
            body,
            timeout: self
                .spec
                .timeout_ms
                .map(Duration::from_millis)
                .unwrap_or(DEFAULT_TIMEOUT),
        };

        tracing::debug!(plugin = %self.spec.name, url = %request.url, "invoking api plugin");

        match self.transport.execute(request).await {
            Ok(response) if response.is_success() => HttpPluginOutput {
                callback_action: self.spec.success_action.clone(),
                response_body: Some(transformer::apply(&self.spec.response, &response.body)),
                request_payload,
                error: None,
            },
            Ok(response) => HttpPluginOutput {
                callback_action: self.spec.error_action.clone(),
                response_body: Some(response.body),
                request_payload,
                error: Some(format!(
                    "request to {} failed with status {}",
                    self.spec.name, response.status
                )),
            },
            Err(error) => HttpPluginOutput {
                callback_action: self.spec.error_action.clone(),
                response_body: None,
                request_payload,
                error: Some(error.to_string()),
            },
        }
    }
}

impl std::fmt::Debug for ApiPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiPlugin")
            .field("spec", &self.spec)
            .finish_non_exhaustive()
    }
}
