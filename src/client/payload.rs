use bytes::Bytes;
use serde::Serialize;

use super::error::ClientError;

/// Outgoing message body.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
	/// UTF-8 text, sent as is
	Text(String),
	/// Raw bytes, sent as is
	Binary(Bytes),
	/// Structured value, encoded as JSON text
	Structured(serde_json::Value),
}

impl Payload {
	/// Structured payload from any serializable value.
	pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<Self, ClientError> {
		serde_json::to_value(value)
			.map(Payload::Structured)
			.map_err(|err| {
				ClientError::invalid_argument(format!(
					"payload is not serializable: {err}"
				))
			})
	}

	/// Wire bytes of this payload.
	pub fn encode(self) -> Result<Bytes, ClientError> {
		match self {
			| Payload::Text(text) => Ok(Bytes::from(text)),
			| Payload::Binary(bytes) => Ok(bytes),
			| Payload::Structured(value) => serde_json::to_vec(&value)
				.map(Bytes::from)
				.map_err(|err| {
					ClientError::invalid_argument(format!(
						"payload is not serializable: {err}"
					))
				}),
		}
	}
}

impl From<&str> for Payload {
	fn from(text: &str) -> Self {
		Payload::Text(text.to_owned())
	}
}

impl From<String> for Payload {
	fn from(text: String) -> Self {
		Payload::Text(text)
	}
}

impl From<Bytes> for Payload {
	fn from(bytes: Bytes) -> Self {
		Payload::Binary(bytes)
	}
}

impl From<Vec<u8>> for Payload {
	fn from(bytes: Vec<u8>) -> Self {
		Payload::Binary(Bytes::from(bytes))
	}
}

impl From<&[u8]> for Payload {
	fn from(bytes: &[u8]) -> Self {
		Payload::Binary(Bytes::copy_from_slice(bytes))
	}
}

impl From<serde_json::Value> for Payload {
	fn from(value: serde_json::Value) -> Self {
		Payload::Structured(value)
	}
}
