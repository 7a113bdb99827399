//! Sensor bridge demonstration
//!
//! Registers a bridge on the in-process transport, drives it through the
//! control channel and streams readings from a background sampler.
//!
//! Run with:
//! ```bash
//! cargo run -p core-service --example sensor_demo
//!
//! # JSON logs, identifier-keyed listeners
//! cargo run -p core-service --example sensor_demo -- json reject
//! ```

use std::env;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use bridge_desktop::{InMemoryInitializer, LocalTransport, StreamItem};
use bridge_traits::{LogLevel, MethodCall, MethodResponse};
use core_runtime::config::{BridgeConfig, DuplicatePolicy};
use core_runtime::logging::{init_logging, LogFormat, LoggingConfig};
use core_service::SensorBridge;
use futures::StreamExt;
use serde_json::{json, Value};
use tracing::info;

const PLUGIN: &str = "awareframework_core";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();

    let format = match args.get(1).map(String::as_str) {
        Some("json") => LogFormat::Json,
        Some("compact") => LogFormat::Compact,
        _ => LogFormat::Pretty,
    };
    let policy = match args.get(2).map(String::as_str) {
        Some("reject") => DuplicatePolicy::RejectDuplicateId,
        _ => DuplicatePolicy::OverwriteByName,
    };

    init_logging(
        LoggingConfig::default()
            .with_format(format)
            .with_level(LogLevel::Debug),
    )?;

    let initializer = Arc::new(InMemoryInitializer::new());
    let config = BridgeConfig::for_plugin(PLUGIN)
        .duplicate_policy(policy)
        .sensor_initializer(initializer.clone())
        .build()?;
    let method_channel = config.method_channel.clone();
    let event_channel = config.event_channels[0].clone();

    let bridge = SensorBridge::new(config)?;
    let transport = Arc::new(LocalTransport::new());
    bridge.register(transport.clone())?;

    let call = |name: &str, arguments: Option<Value>| -> anyhow::Result<MethodResponse> {
        let mut call = MethodCall::new(name);
        call.arguments = arguments;
        transport
            .invoke(&method_channel, &call)
            .with_context(|| format!("calling {}", name))
    };

    call("enable", None)?;
    call("set_label", Some(json!({ "label": "walking" })))?;
    call("start", None)?;
    match call("is_enable", None)? {
        MethodResponse::Success(Some(enabled)) => info!(%enabled, "Sensor state"),
        other => bail!("unexpected is_enable response: {:?}", other),
    }
    info!(response = ?call("calibrate", None)?, "Unknown call");

    let stream = transport.listen(
        &event_channel,
        Some(json!({ "name": "accelerometer", "id": "demo-1" })),
    )?;

    let sampler = {
        let bridge = bridge.clone();
        tokio::spawn(async move {
            for seq in 0..5 {
                bridge.emit(
                    "accelerometer",
                    json!({ "seq": seq, "x": 0.01 * seq as f64, "y": 9.81, "z": 0.0 }),
                );
                tokio::time::sleep(Duration::from_millis(50)).await;
            }
        })
    };
    sampler.await?;

    call("sync", Some(json!({ "force": true })))?;
    call("stop", None)?;
    bridge.teardown()?;

    let readings: Vec<StreamItem> = stream.collect().await;
    info!(count = readings.len(), "Readings received");
    info!(sensor = ?initializer.sensor().snapshot(), "Final sensor state");

    Ok(())
}
