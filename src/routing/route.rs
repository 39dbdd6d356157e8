use std::sync::Arc;

use crate::client::Message;

/// Link of the client's dispatch chain.
///
/// The client offers every inbound message to its routes in the order they
/// were attached. The first route returning `true` owns the message; when
/// none does, the message is emitted as [`ClientEvent::Message`].
///
/// [`ClientEvent::Message`]: crate::ClientEvent::Message
pub trait Route: Send + Sync + 'static {
	/// Claims `message` and schedules its processing, or declines it.
	///
	/// Runs on the client's event pump, so it must not block.
	fn handle(&self, message: &Message) -> bool;
}

impl<R: Route + ?Sized> Route for Arc<R> {
	fn handle(&self, message: &Message) -> bool {
		(**self).handle(message)
	}
}
