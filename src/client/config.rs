//! Configuration for the client facade

use super::error::ClientError;

/// Client-level behavior settings
#[derive(Debug, Clone)]
pub struct ClientSettings {
	/// Upper bound for `connect` to receive the connection acknowledgement
	pub connection_timeout_millis: u64,
	/// Capacity of the lifecycle event broadcast channel (must be > 0)
	pub event_channel_capacity: usize,
}

impl Default for ClientSettings {
	fn default() -> Self {
		Self {
			connection_timeout_millis: 30_000,
			event_channel_capacity: 64,
		}
	}
}

impl ClientSettings {
	pub(crate) fn validate(&self) -> Result<(), ClientError> {
		if self.connection_timeout_millis == 0 {
			return Err(ClientError::ConfigurationValue(
				"connection_timeout_millis must be greater than 0".to_string(),
			));
		}
		if self.event_channel_capacity == 0 {
			return Err(ClientError::ConfigurationValue(
				"event_channel_capacity must be greater than 0".to_string(),
			));
		}
		Ok(())
	}
}
