//! MQTT transport

use std::time::Duration;

use async_trait::async_trait;
use ha_bridge::{PublishError, Publisher};
use ha_config::MqttConfig;
use rumqttc::{AsyncClient, MqttOptions, QoS};

/// Shortest keep-alive the client accepts
const MIN_KEEP_ALIVE_SECS: u64 = 5;

pub fn options(config: &MqttConfig) -> MqttOptions {
    let mut options = MqttOptions::new(&config.client_id, &config.host, config.port);
    options.set_keep_alive(Duration::from_secs(
        config.keep_alive_secs.max(MIN_KEEP_ALIVE_SECS),
    ));
    if let Some(username) = &config.username {
        options.set_credentials(username, config.password.clone().unwrap_or_default());
    }
    options
}

/// [`Publisher`] sending commands to the broker
pub struct MqttPublisher {
    client: AsyncClient,
}

impl MqttPublisher {
    pub fn new(client: AsyncClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Publisher for MqttPublisher {
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
        self.client
            .publish(topic, QoS::AtLeastOnce, false, payload)
            .await
            .map_err(|e| PublishError {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_from_config() {
        let config = MqttConfig {
            host: "broker.local".to_string(),
            port: 8883,
            client_id: "bridge-test".to_string(),
            keep_alive_secs: 1,
            username: Some("bridge".to_string()),
            password: None,
        };
        let options = options(&config);
        assert_eq!(options.broker_address(), ("broker.local".to_string(), 8883));
        assert_eq!(options.client_id(), "bridge-test");
        assert_eq!(options.keep_alive(), Duration::from_secs(5));
        assert_eq!(
            options.credentials(),
            Some(("bridge".to_string(), String::new()))
        );
    }
}
