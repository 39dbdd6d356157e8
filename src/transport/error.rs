use thiserror::Error;

/// Failures reported by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// Address or options could not be turned into a connection
	#[error("Invalid transport configuration: {0}")]
	Configuration(String),
	/// Network or protocol failure
	#[error("Connection error: {0}")]
	Connection(String),
	/// Broker refused the connection
	#[error("Broker refused connection: {0}")]
	Refused(String),
	/// A publish/subscribe/unsubscribe request could not be issued
	#[error("Request failed: {0}")]
	Request(String),
	/// The session closed before the operation completed
	#[error("Connection closed")]
	Closed,
}
