use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;
use serde::de::DeserializeOwned;

use crate::topic::{Capture, CaptureMap};
use crate::transport::IncomingMessage;

/// Inbound message as seen by routes and handlers.
///
/// `params` holds the captures of the pattern that claimed the message and
/// stays empty for unrouted messages.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
	pub topic: ArcStr,
	pub payload: Bytes,
	pub qos: QoS,
	pub retain: bool,
	pub dup: bool,
	pub params: CaptureMap,
}

impl Message {
	/// Payload as UTF-8 text, if it is valid UTF-8.
	pub fn payload_str(&self) -> Option<&str> {
		std::str::from_utf8(&self.payload).ok()
	}

	/// Payload decoded from JSON.
	pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
		serde_json::from_slice(&self.payload)
	}

	/// Capture by name.
	pub fn param(&self, name: &str) -> Option<&Capture> {
		self.params.get(name)
	}

	pub fn with_params(mut self, params: CaptureMap) -> Self {
		self.params = params;
		self
	}
}

impl From<IncomingMessage> for Message {
	fn from(incoming: IncomingMessage) -> Self {
		Self {
			topic: incoming.topic,
			payload: incoming.payload,
			qos: incoming.qos,
			retain: incoming.retain,
			dup: incoming.dup,
			params: CaptureMap::new(),
		}
	}
}
