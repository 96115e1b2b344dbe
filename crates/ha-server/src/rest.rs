//! REST transport for service calls and state fetches

use std::time::Duration;

use async_trait::async_trait;
use ha_bridge::{Method, RemoteCaller, RemoteError, RemoteRequest, RemoteResponse};
use ha_config::ApiConfig;
use reqwest::Client;
use serde_json::Value;
use tracing::trace;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// [`RemoteCaller`] backed by the Home Assistant REST API
pub struct RestCaller {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl RestCaller {
    pub fn new(api: &ApiConfig) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            base_url: api.base_url.trim_end_matches('/').to_string(),
            token: api.token.clone().filter(|t| !t.is_empty()),
        })
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with('/') {
            format!("{}{}", self.base_url, path)
        } else {
            format!("{}/{}", self.base_url, path)
        }
    }
}

/// Response body as JSON, falling back to the raw text
fn parse_body(text: String) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&text).unwrap_or(Value::String(text))
}

#[async_trait]
impl RemoteCaller for RestCaller {
    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let url = self.url(&request.path);
        let mut builder = match request.method {
            Method::Get => self.client.get(&url),
            Method::Post => self.client.post(&url),
        };
        if let Some(token) = &self.token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::transport(e.to_string()))?;
        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RemoteError::status(status, e.to_string()))?;

        trace!(method = %request.method, url = %url, status, "Remote call finished");
        Ok(RemoteResponse {
            status,
            body: parse_body(text),
        })
    }
}
