use std::env;

use uuid::Uuid;

/// MQTT broker URL from `MQTT_BROKER`, falling back to a public broker.
///
/// `.env` and `demos/.env.local` are loaded first.
pub fn broker_url() -> String {
	dotenv::dotenv().ok();
	if std::path::Path::new("demos/.env.local").exists() {
		dotenv::from_filename("demos/.env.local").ok();
	}
	env::var("MQTT_BROKER")
		.unwrap_or_else(|_| "mqtt://broker.hivemq.com:1883".to_string())
}

/// Broker URL with a unique `client_id` query parameter.
pub fn build_url(client_id_prefix: &str) -> String {
	let base_url = broker_url();
	let uuid = Uuid::new_v4().to_string();
	let client_id = format!("{client_id_prefix}_{}", &uuid[..8]);
	if base_url.contains('?') {
		format!("{base_url}&client_id={client_id}")
	} else {
		format!("{base_url}?client_id={client_id}")
	}
}
