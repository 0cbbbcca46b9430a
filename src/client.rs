use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Client, Response};
use serde_json::Value;

use crate::error::{Error, Result};
use crate::event;
use crate::settings::Credentials;
use crate::types::{BatchEnvelope, Envelope, EventData, Method, Params, json_kind};

pub const BASE_URL: &str = "https://event.jirafe.com/v2";

/// Configuration for JirafeClient
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// API root, without a trailing slash
    pub base_url: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: BASE_URL.to_string(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
        }
    }
}

/// Authenticated client for the Jirafe event ingestion API.
///
/// Every call is scoped under the configured site ID and issues exactly one
/// HTTP request. Nothing is retried or cached.
pub struct JirafeClient {
    http_client: Client,
    base_url: String,
    site_id: String,
}

impl JirafeClient {
    pub fn new(credentials: &Credentials) -> Result<Self> {
        Self::with_config(credentials, ClientConfig::default())
    }

    /// Fails with [`Error::NotConfigured`] before any I/O when either
    /// credential is empty.
    pub fn with_config(credentials: &Credentials, config: ClientConfig) -> Result<Self> {
        if !credentials.is_complete() {
            return Err(Error::NotConfigured);
        }

        let mut auth_value = HeaderValue::from_str(&format!("Bearer {}", credentials.api_token))
            .map_err(|_| {
                Error::InvalidCredentials("token has characters not allowed in a header".into())
            })?;
        auth_value.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth_value);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let http_client = Client::builder()
            .default_headers(headers)
            .build()
            .map_err(Error::request_failed)?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            site_id: credentials.site_id.clone(),
        })
    }

    pub fn site_id(&self) -> &str {
        &self.site_id
    }

    fn site_path(&self, resource: &str) -> String {
        format!("/{}/{}", self.site_id, resource)
    }

    /// Issue a single request to `{base_url}{path}`.
    ///
    /// For GET the body is sent as query parameters (it must be a JSON object
    /// or absent); for POST it is the JSON request body.
    pub async fn request(&self, method: Method, path: &str, body: Option<&Value>) -> Result<Value> {
        let url = format!("{}{}", self.base_url, path);
        tracing::debug!("{} {}", method, url);

        let builder = match method {
            Method::Get => {
                let pairs = query_pairs(body)?;
                let builder = self.http_client.get(&url);
                if pairs.is_empty() {
                    builder
                } else {
                    builder.query(&pairs)
                }
            }
            Method::Post => {
                let builder = self.http_client.post(&url);
                match body {
                    Some(body) => builder.json(body),
                    None => builder,
                }
            }
        };

        let response = builder.send().await.map_err(|e| {
            tracing::warn!("{} {} failed: {}", method, url, e);
            Error::request_failed(e)
        })?;

        tracing::debug!("{} {} -> {}", method, url, response.status());
        read_response(response).await
    }

    pub async fn track_event(&self, envelope: &Envelope) -> Result<Value> {
        let body = serde_json::to_value(envelope)?;
        self.request(Method::Post, &self.site_path("events"), Some(&body)).await
    }

    /// Submit all events in one call. The server's single response covers the whole batch.
    pub async fn track_batch(&self, batch: &BatchEnvelope) -> Result<Value> {
        let body = serde_json::to_value(batch)?;
        self.request(Method::Post, &self.site_path("batch"), Some(&body)).await
    }

    pub async fn get_analytics(&self, params: &Params) -> Result<Value> {
        let query = Value::Object(params.clone());
        self.request(Method::Get, &self.site_path("analytics"), Some(&query)).await
    }

    pub async fn get_stats(&self, params: &Params) -> Result<Value> {
        let query = Value::Object(params.clone());
        self.request(Method::Get, &self.site_path("stats"), Some(&query)).await
    }

    pub async fn track_page_view(&self, data: impl Into<EventData>) -> Result<Value> {
        self.track_event(&event::build_page_view(data)).await
    }

    pub async fn track_product(&self, action: &str, data: impl Into<EventData>) -> Result<Value> {
        self.track_event(&event::build_product_event(action, data)).await
    }

    pub async fn track_cart(&self, action: &str, data: impl Into<EventData>) -> Result<Value> {
        self.track_event(&event::build_cart_event(action, data)).await
    }

    pub async fn track_order(&self, data: impl Into<EventData>) -> Result<Value> {
        self.track_event(&event::build_order_event(data)).await
    }

    pub async fn track_user(&self, action: &str, data: impl Into<EventData>) -> Result<Value> {
        self.track_event(&event::build_user_event(action, data)).await
    }

    pub async fn track_custom(
        &self,
        kind: impl Into<String>,
        data: impl Into<EventData>,
    ) -> Result<Value> {
        self.track_event(&event::build_custom_event(kind, data)).await
    }
}

/// Flatten a JSON object into query pairs
fn query_pairs(params: Option<&Value>) -> Result<Vec<(String, String)>> {
    let map = match params {
        None | Some(Value::Null) => return Ok(Vec::new()),
        Some(Value::Object(map)) => map,
        Some(other) => {
            return Err(Error::InvalidData(format!(
                "query parameters must be a JSON object, got {}",
                json_kind(other)
            )));
        }
    };

    Ok(map
        .iter()
        .map(|(key, value)| {
            let value = match value {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            (key.clone(), value)
        })
        .collect())
}

/// Turn a response into its JSON body or a single-message error
async fn read_response(response: Response) -> Result<Value> {
    let status = response.status();
    let status_error = response.error_for_status_ref().err();
    let body = response.text().await.map_err(Error::request_failed)?;

    if let Some(status_error) = status_error {
        tracing::warn!("Request rejected with {}", status);
        return Err(match server_message(&body) {
            Some(message) => Error::Request(message),
            None => Error::request_failed(status_error),
        });
    }

    if body.trim().is_empty() {
        return Ok(Value::Null);
    }

    serde_json::from_str(&body)
        .map_err(|e| Error::request_failed(format!("invalid JSON in response: {}", e)))
}

/// The `message` field of a JSON error body, if present and non-empty
fn server_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    match value.get("message")? {
        Value::String(message) if !message.is_empty() => Some(message.clone()),
        _ => None,
    }
}
