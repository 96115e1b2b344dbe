//! Service call type for the remote-call command path

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use ulid::Ulid;

use crate::EntityId;

/// A Home Assistant service invocation targeting one entity
///
/// `service_data` holds the call parameters without the `entity_id`; the
/// target is added when the request body is rendered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceCall {
    pub entity_id: EntityId,

    /// The service name (e.g. "turn_on", "set_cover_position")
    pub service: String,

    #[serde(default)]
    pub service_data: Map<String, Value>,

    /// Correlation id (ULID) used to match logs and acknowledgements
    pub call_id: String,
}

impl ServiceCall {
    pub fn new(entity_id: EntityId, service: impl Into<String>) -> Self {
        Self {
            entity_id,
            service: service.into(),
            service_data: Map::new(),
            call_id: Ulid::new().to_string(),
        }
    }

    /// Add one parameter to the service data
    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.service_data.insert(key.to_string(), value.into());
        self
    }

    pub fn domain(&self) -> &'static str {
        self.entity_id.domain().as_str()
    }

    /// Full service identifier (`domain.service`)
    pub fn service_id(&self) -> String {
        format!("{}.{}", self.domain(), self.service)
    }

    /// REST path of the service endpoint
    pub fn path(&self) -> String {
        format!("/api/services/{}/{}", self.domain(), self.service)
    }

    /// JSON request body: the service data plus the target `entity_id`
    pub fn body(&self) -> Value {
        let mut body = self.service_data.clone();
        body.insert(
            "entity_id".to_string(),
            Value::String(self.entity_id.to_string()),
        );
        Value::Object(body)
    }

    /// Get a value from service_data
    pub fn get<T: serde::de::DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.service_data
            .get(key)
            .and_then(|v| serde_json::from_value(v.clone()).ok())
    }
}
