//! # Router demo
//!
//! Two routers on one connection:
//! - `home/rooms/+room/#sensor` captures the room and the sensor path
//! - a second router scoped to `home/alarms` claims what the first leaves
//!
//! Set `MQTT_BROKER` (or put it into `.env`) to use another broker.

mod shared;

use std::time::Duration;

use mqtt_pattern_router::prelude::*;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Serialize)]
struct Reading {
	value: f64,
	unit: &'static str,
}

#[tokio::main]
async fn main() -> Result<()> {
	shared::tracing::setup();

	let client = MqttClient::new(RumqttcTransport::new());
	let home = Router::new(&client, RouterOptions::with_prefix("home"));
	let alarms = Router::new(&client, RouterOptions::with_prefix("home/alarms"));

	// Registered before connecting: queued and replayed on connect
	home.subscribe("rooms/+room/#sensor", |message: Message| async move {
		let room = message.params.single("room").unwrap_or("?");
		let sensor = message.params.multi("sensor").unwrap_or_default();
		info!(room, sensor = %sensor.join("/"), payload = ?message.payload_str(), "Room reading");
	})
	.await?;
	alarms
		.subscribe(
			"+zone",
			handler_fn(|message: Message| {
				warn!(zone = message.params.single("zone"), "Alarm raised");
			}),
		)
		.await?;

	let mut events = client.events();
	tokio::spawn(async move {
		while let Ok(event) = events.recv().await {
			match event {
				| ClientEvent::Message(message) => {
					info!(topic = %message.topic, "Unrouted message")
				}
				| other => info!(event = ?other, "Client event"),
			}
		}
	});

	let url = shared::config::build_url("router_demo");
	info!(url = %url, "Connecting");
	let ack = client.connect(&url).await?;
	info!(session_present = ack.session_present, "Connected");

	home.publish(
		"rooms/kitchen/temperature",
		Payload::json(&Reading {
			value: 21.5,
			unit: "C",
		})?,
	)
	.await?;
	home.publish("rooms/hall/motion/front", "detected").await?;
	alarms.publish("garage", "open").await?;

	tokio::time::sleep(Duration::from_secs(2)).await;
	info!(patterns = ?home.patterns(), "Shutting down");
	client.end(false).await?;
	Ok(())
}
