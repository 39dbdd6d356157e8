//! Transport seam
//!
//! The router core only needs a handful of capabilities from the underlying
//! MQTT connection. They are expressed here as the [`Transport`] and
//! [`Session`] traits; [`RumqttcTransport`] is the bundled implementation.

use std::future::Future;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::mpsc;

mod ack_tracker;
pub mod error;
pub mod rumqttc_transport;

pub use error::TransportError;
pub use rumqttc_transport::{RumqttcSession, RumqttcSettings, RumqttcTransport};

/// Broker acknowledgement of a connection attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnAck {
	/// True when the broker resumed a previous session for this client
	pub session_present: bool,
}

/// Message delivered by the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingMessage {
	/// Concrete topic the message was published to
	pub topic: ArcStr,
	/// Raw payload
	pub payload: Bytes,
	/// Delivery QoS
	pub qos: QoS,
	/// Retained message flag
	pub retain: bool,
	/// Duplicate delivery flag
	pub dup: bool,
}

impl IncomingMessage {
	/// Creates a QoS 0, non-retained message.
	pub fn new(topic: impl Into<ArcStr>, payload: impl Into<Bytes>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			qos: QoS::AtMostOnce,
			retain: false,
			dup: false,
		}
	}
}

/// Connection lifecycle and traffic reported by a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	/// Connection (re-)established
	Connect(ConnAck),
	/// A reconnection attempt is starting
	Reconnect,
	/// The connection dropped; the transport will try to reconnect
	Offline,
	/// The session is finished; no further events follow
	Close,
	/// Transport-level failure
	Error(TransportError),
	/// Inbound publish
	Message(IncomingMessage),
}

/// Options for an outgoing publish.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
	/// Delivery QoS
	pub qos: QoS,
	/// Ask the broker to retain the message
	pub retain: bool,
	/// Mark as a duplicate delivery
	pub dup: bool,
}

impl Default for PublishOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
			retain: false,
			dup: false,
		}
	}
}

/// Options for a subscription request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
	/// Maximum QoS requested for the filters
	pub qos: QoS,
}

impl Default for SubscribeOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
		}
	}
}

/// Broker answer for one subscribed filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicGrant {
	/// The filter as sent to the broker
	pub topic: ArcStr,
	/// Granted QoS, `None` when the broker refused the filter
	pub qos: Option<QoS>,
}

/// A freshly opened session together with its event stream.
pub struct Connection<S> {
	/// Handle used for requests
	pub session: S,
	/// Lifecycle and message events; ends after [`TransportEvent::Close`]
	pub events: mpsc::Receiver<TransportEvent>,
}

/// One live transport session.
pub trait Session: Send + Sync + 'static {
	/// Publishes a payload, resolving once the transport accepted it.
	fn publish(
		&self,
		topic: ArcStr,
		payload: Bytes,
		options: PublishOptions,
	) -> impl Future<Output = Result<(), TransportError>> + Send;

	/// Subscribes to bare-wildcard filters and reports the grant per filter.
	fn subscribe(
		&self,
		filters: Vec<ArcStr>,
		options: SubscribeOptions,
	) -> impl Future<Output = Result<Vec<TopicGrant>, TransportError>> + Send;

	/// Removes subscriptions.
	fn unsubscribe(
		&self,
		filters: Vec<ArcStr>,
	) -> impl Future<Output = Result<(), TransportError>> + Send;

	/// Closes the session. After it resolves the event stream terminates.
	fn end(
		&self,
		force: bool,
	) -> impl Future<Output = Result<(), TransportError>> + Send;
}

/// Factory for sessions.
pub trait Transport: Send + Sync + 'static {
	/// Session type produced by this transport
	type Session: Session;

	/// Starts a session to `address`.
	///
	/// The connection is not established until the event stream yields
	/// [`TransportEvent::Connect`].
	fn connect(
		&self,
		address: &str,
	) -> impl Future<Output = Result<Connection<Self::Session>, TransportError>> + Send;
}
