use crate::topic::PatternError;
use crate::transport::TransportError;

/// Errors returned by [`MqttClient`](super::MqttClient) and
/// [`Router`](crate::Router) operations
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ClientError {
	/// Malformed input to a public operation
	#[error("Invalid argument: {0}")]
	InvalidArgument(String),

	/// Topic or pattern rejected by the pattern engine
	#[error("Invalid topic pattern: {0}")]
	InvalidPattern(#[from] PatternError),

	/// `connect` called while a session exists or is being established
	#[error("Client is already connected")]
	AlreadyConnected,

	/// Operation needs an active session
	#[error("Client is not connected")]
	NotConnected,

	/// The session closed before the operation completed
	#[error("Connection closed")]
	ConnectionClosed,

	/// No connection acknowledgement within the configured timeout
	#[error("Connection establishment timed out after {timeout_millis}ms")]
	ConnectTimeout { timeout_millis: u64 },

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Failure reported by the transport, passed through unchanged
	#[error("Transport error: {0}")]
	Transport(TransportError),
}

impl ClientError {
	pub fn invalid_argument(message: impl Into<String>) -> Self {
		ClientError::InvalidArgument(message.into())
	}

	/// True for input validation failures, which never touch the transport.
	pub fn is_invalid_argument(&self) -> bool {
		matches!(
			self,
			ClientError::InvalidArgument(_) | ClientError::InvalidPattern(_)
		)
	}
}

impl From<TransportError> for ClientError {
	fn from(err: TransportError) -> Self {
		match err {
			| TransportError::Closed => ClientError::ConnectionClosed,
			| other => ClientError::Transport(other),
		}
	}
}
