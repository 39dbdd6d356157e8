//! Lifecycle events and connection state

use super::message::Message;
use crate::transport::{ConnAck, TransportError};

/// Event emitted by the client and forwarded by every router.
#[derive(Debug, Clone, PartialEq)]
pub enum ClientEvent {
	/// Connection acknowledged by the broker
	Connect(ConnAck),
	/// Transport started a reconnection attempt
	Reconnect,
	/// Session finished
	Close,
	/// Connection lost, transport will retry
	Offline,
	/// Transport-level failure
	Error(TransportError),
	/// Inbound message no route claimed
	Message(Message),
}

/// Connection state of the client.
///
/// `Idle -> Connecting -> Connected <-> Reconnecting -> Closed`. A new
/// `connect` call starts over from `Closed`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
	#[default]
	Idle,
	Connecting,
	Connected,
	Reconnecting,
	Closed,
}

impl ConnectionState {
	/// Publishes and subscriptions pass straight to the session.
	pub fn is_connected(self) -> bool {
		self == ConnectionState::Connected
	}

	/// A session exists but the link is down.
	pub fn is_reconnecting(self) -> bool {
		self == ConnectionState::Reconnecting
	}
}
