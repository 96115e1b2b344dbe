//! Outbound transport ports
//!
//! The engine never talks to the network itself. Commands leave through a
//! [`Publisher`] (pub/sub) or a [`RemoteCaller`] (HTTP service calls and state
//! fetches); the binary supplies the real implementations.

use async_trait::async_trait;
use serde_json::Value;
use std::fmt;
use thiserror::Error;

/// HTTP method of a remote call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Method::Get => f.write_str("GET"),
            Method::Post => f.write_str("POST"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteRequest {
    pub method: Method,
    /// Path below the API base URL, e.g. `/api/services/light/turn_on`
    pub path: String,
    pub body: Option<Value>,
}

impl RemoteRequest {
    pub fn get(path: impl Into<String>) -> Self {
        Self {
            method: Method::Get,
            path: path.into(),
            body: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self {
            method: Method::Post,
            path: path.into(),
            body: Some(body),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RemoteResponse {
    pub status: u16,
    pub body: Value,
}

impl RemoteResponse {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Structured remote-call failure; `status` is `None` for transport errors
#[derive(Debug, Clone, Error, PartialEq)]
#[error("remote call failed ({}): {message}", status_text(.status))]
pub struct RemoteError {
    pub status: Option<u16>,
    pub message: String,
}

impl RemoteError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self {
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
        }
    }

    /// Turn a non-2xx response into an error
    pub fn from_response(response: &RemoteResponse) -> Self {
        let message = match &response.body {
            Value::Object(map) => map
                .get("message")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| response.body.to_string()),
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        };
        Self::status(response.status, message)
    }
}

fn status_text(status: &Option<u16>) -> String {
    match status {
        Some(code) => code.to_string(),
        None => "no response".to_string(),
    }
}

/// HTTP request/response port
#[async_trait]
pub trait RemoteCaller: Send + Sync {
    async fn call(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError>;
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("publish to '{topic}' failed: {message}")]
pub struct PublishError {
    pub topic: String,
    pub message: String,
}

/// Pub/sub publish port
#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError>;
}
