//! # MQTT Pattern Router
//!
//! Topic-pattern routing on top of an MQTT connection.
//!
//! ## Features
//!
//! - **Named wildcards**: `+name` captures one level, `#name` the rest of the topic
//! - **First match wins**: bindings are tried in registration order across all routers
//! - **Prefix scoping**: a router can live below a topic prefix such as `device/42`
//! - **Offline queueing**: publishes and subscriptions issued while disconnected
//!   are replayed after the next clean connect
//! - **Pluggable transport**: [`Transport`] seam with a bundled `rumqttc` implementation
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt_pattern_router::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let client = MqttClient::new(RumqttcTransport::new());
//!     client
//!         .connect("mqtt://broker.hivemq.com:1883?client_id=router_docs")
//!         .await?;
//!
//!     let router = Router::new(&client, RouterOptions::with_prefix("device/42"));
//!     router
//!         .subscribe("sensors/+sensor/#path", |message: Message| async move {
//!             println!(
//!                 "{:?} at {:?}",
//!                 message.params.single("sensor"),
//!                 message.params.multi("path"),
//!             );
//!         })
//!         .await?;
//!
//!     router.publish("sensors/t1/value", "21.5").await?;
//!     client.end(false).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` or `+name` matches exactly one non-empty level
//! - `#` or `#name` matches every remaining level and must be the last segment
//! - Capture names never affect matching; they are stripped before the
//!   filter reaches the broker (`a/+id/#rest` subscribes to `a/+/#`)

pub mod client;
pub mod routing;
pub mod topic;
pub mod transport;

pub use client::{
	ClientError, ClientEvent, ClientSettings, ConnectionState, Grant, Message,
	MqttClient, Payload, PendingSummary, PublishOutcome,
};
pub use routing::{Handler, Route, Router, RouterOptions, handler_fn};
pub use rumqttc::QoS;
pub use topic::{
	Capture, CaptureMap, PatternError, TopicPattern, Topics, extract, matches,
	normalize, normalize_all,
};
pub use transport::{
	ConnAck, IncomingMessage, PublishOptions, RumqttcSettings,
	RumqttcTransport, Session, SubscribeOptions, TopicGrant, Transport,
	TransportError, TransportEvent,
};

/// Result type alias for operations that may fail with [`ClientError`]
pub type Result<T> = std::result::Result<T, ClientError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_pattern_router::prelude::*;
/// ```
pub mod prelude {
	pub use crate::{
		CaptureMap, ClientError, ClientEvent, ClientSettings, ConnectionState,
		Grant, Message, MqttClient, Payload, PublishOptions, QoS, Result,
		Router, RouterOptions, RumqttcSettings, RumqttcTransport,
		SubscribeOptions, handler_fn,
	};
}
