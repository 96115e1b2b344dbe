//! Home Assistant bridge daemon
//!
//! Loads `bridge.yaml`, connects to the MQTT broker and, when an `api`
//! section is configured, to the REST API, then drives the bridge engine
//! from a single task: broker messages, slot writes typed on stdin as
//! `<slot> <value>`, and the periodic acknowledgement check.

mod mqtt;
mod rest;

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::Utc;
use ha_bridge::{Bridge, MemorySlotStore, RemoteCaller};
use ha_config::BridgeConfig;
use ha_state_store::AttributeCache;
use rumqttc::{AsyncClient, Event, Packet, QoS};
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

use crate::mqtt::MqttPublisher;
use crate::rest::RestCaller;

/// Config directory when neither an argument nor the variable is given
const DEFAULT_CONFIG_DIR: &str = ".";
const CONFIG_DIR_ENV: &str = "HA_BRIDGE_CONFIG";

const MQTT_CHANNEL_CAPACITY: usize = 64;
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// A slot write requested by the host
#[derive(Debug, PartialEq)]
struct WriteRequest {
    identifier: String,
    value: Value,
}

/// Parse `<slot> <value>`; the value is JSON when it parses, text otherwise
fn parse_write(line: &str) -> Option<WriteRequest> {
    let (identifier, raw) = line.trim().split_once(char::is_whitespace)?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    let value = serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()));
    Some(WriteRequest {
        identifier: identifier.to_string(),
        value,
    })
}

async fn read_writes(tx: mpsc::Sender<WriteRequest>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }
        match parse_write(&line) {
            Some(request) => {
                if tx.send(request).await.is_err() {
                    break;
                }
            }
            None => warn!(line = %line, "Expected '<slot> <value>'"),
        }
    }
    debug!("Write input closed");
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();

    let config_dir = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_DIR_ENV).ok())
        .unwrap_or_else(|| DEFAULT_CONFIG_DIR.to_string());
    info!(config_dir = %config_dir, "Starting Home Assistant bridge");

    let config = BridgeConfig::load(&config_dir)
        .with_context(|| format!("failed to load configuration from {config_dir}"))?;

    let cache = match &config.cache_path {
        Some(path) => AttributeCache::load(path)
            .with_context(|| format!("failed to load attribute cache {}", path.display()))?,
        None => AttributeCache::in_memory(),
    };

    let mut bridge = Bridge::new(MemorySlotStore::new(), cache);
    bridge.apply_config(&config);

    let remote = config
        .api
        .as_ref()
        .map(RestCaller::new)
        .transpose()
        .context("failed to build REST client")?;
    if let Some(remote) = &remote {
        let refreshed = bridge.refresh_from_remote(remote).await;
        info!(refreshed, "Fetched initial entity states");
    }

    let (client, mut eventloop) = AsyncClient::new(mqtt::options(&config.mqtt), MQTT_CHANNEL_CAPACITY);
    let publisher = MqttPublisher::new(client.clone());
    let filter = bridge.subscription_filter();

    let (write_tx, mut write_rx) = mpsc::channel(32);
    tokio::spawn(read_writes(write_tx));

    let mut ack_check = tokio::time::interval(config.ack_check_interval());
    ack_check.set_missed_tick_behavior(MissedTickBehavior::Skip);

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    info!(broker = %config.mqtt.host, port = config.mqtt.port, "Bridge running");

    loop {
        tokio::select! {
            event = eventloop.poll() => match event {
                Ok(Event::Incoming(Packet::ConnAck(_))) => {
                    info!(filter = %filter, "Connected to broker");
                    if let Err(e) = client.subscribe(filter.as_str(), QoS::AtLeastOnce).await {
                        warn!(error = %e, "Subscribe failed");
                    }
                }
                Ok(Event::Incoming(Packet::Publish(publish))) => {
                    bridge.handle_message(&publish.topic, &publish.payload);
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "Broker connection lost, retrying");
                    tokio::time::sleep(RECONNECT_DELAY).await;
                }
            },
            Some(request) = write_rx.recv() => {
                let caller = remote.as_ref().map(|r| r as &dyn RemoteCaller);
                match bridge.write(&request.identifier, &request.value, &publisher, caller).await {
                    Ok(command) => info!(
                        slot = %request.identifier,
                        service = %command.service_id(),
                        "Command sent"
                    ),
                    Err(e) => warn!(slot = %request.identifier, error = %e, "Write rejected"),
                }
            }
            _ = ack_check.tick() => {
                if bridge.has_pending_acks() {
                    bridge.check_acks(Utc::now());
                }
            }
            _ = &mut shutdown => {
                info!("Shutting down");
                break;
            }
        }
    }

    if let Err(e) = client.disconnect().await {
        debug!(error = %e, "Disconnect failed");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_write() {
        assert_eq!(
            parse_write("light_kitchen true"),
            Some(WriteRequest {
                identifier: "light_kitchen".to_string(),
                value: json!(true),
            })
        );
        assert_eq!(
            parse_write("  select_scene   Movie night ").unwrap().value,
            json!("Movie night")
        );
        assert_eq!(
            parse_write(r#"vacuum_robot {"command": "spot_area"}"#).unwrap().value,
            json!({"command": "spot_area"})
        );
        assert!(parse_write("light_kitchen").is_none());
    }
}
