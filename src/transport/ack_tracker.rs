//! Correlates broker acknowledgements with the request that caused them

use std::collections::{HashMap, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use arcstr::ArcStr;
use rumqttc::SubscribeReasonCode;
use tokio::sync::oneshot;
use tracing::{debug, warn};

use super::{TopicGrant, TransportError};

type AckResult = Result<(), TransportError>;
type GrantResult = Result<Vec<TopicGrant>, TransportError>;

trait Waiter {
	fn fail(self);
}

impl Waiter for oneshot::Sender<AckResult> {
	fn fail(self) {
		// the caller may have given up waiting
		let _ = self.send(Err(TransportError::Closed));
	}
}

struct PendingSubAck {
	filters: Vec<ArcStr>,
	respond_to: oneshot::Sender<GrantResult>,
}

impl Waiter for PendingSubAck {
	fn fail(self) {
		let _ = self.respond_to.send(Err(TransportError::Closed));
	}
}

/// Requests of one packet type move through three stages: queued in the
/// request channel, written with a packet id (`Outgoing::*`), answered by an
/// acknowledgement carrying that id. The event loop writes requests in
/// channel order, so ids are assigned to the oldest queued request.
struct Stage<W> {
	queued: VecDeque<W>,
	in_flight: HashMap<u16, W>,
}

impl<W> Default for Stage<W> {
	fn default() -> Self {
		Self {
			queued: VecDeque::new(),
			in_flight: HashMap::new(),
		}
	}
}

impl<W: Waiter> Stage<W> {
	fn assign(&mut self, pkid: u16) -> bool {
		match self.queued.pop_front() {
			| Some(waiter) => {
				self.in_flight.insert(pkid, waiter);
				true
			}
			| None => false,
		}
	}

	fn fail_in_flight(&mut self) {
		for (_, waiter) in self.in_flight.drain() {
			waiter.fail();
		}
	}

	fn fail_all(&mut self) {
		self.fail_in_flight();
		for waiter in self.queued.drain(..) {
			waiter.fail();
		}
	}
}

#[derive(Default)]
struct Tracker {
	publishes: Stage<oneshot::Sender<AckResult>>,
	subscriptions: Stage<PendingSubAck>,
	unsubscriptions: Stage<oneshot::Sender<AckResult>>,
}

/// Acknowledgement bookkeeping shared by a session and its event loop.
///
/// Publishes resolve on PUBACK (QoS 1), PUBCOMP (QoS 2) or as soon as they
/// are written (QoS 0). Subscriptions resolve on SUBACK, unsubscriptions on
/// UNSUBACK.
#[derive(Default)]
pub(crate) struct AckTracker {
	inner: Mutex<Tracker>,
}

impl AckTracker {
	fn lock(&self) -> MutexGuard<'_, Tracker> {
		self.inner.lock().unwrap_or_else(PoisonError::into_inner)
	}

	/// Registers a publish and runs `send` while holding the lock, so the
	/// queue order always equals the request channel order.
	pub(crate) fn enqueue_publish<E>(
		&self,
		send: impl FnOnce() -> Result<(), E>,
	) -> Result<oneshot::Receiver<AckResult>, E> {
		let (respond_to, response) = oneshot::channel();
		let mut tracker = self.lock();
		tracker.publishes.queued.push_back(respond_to);
		if let Err(err) = send() {
			tracker.publishes.queued.pop_back();
			return Err(err);
		}
		Ok(response)
	}

	pub(crate) fn enqueue_subscribe<E>(
		&self,
		filters: Vec<ArcStr>,
		send: impl FnOnce() -> Result<(), E>,
	) -> Result<oneshot::Receiver<GrantResult>, E> {
		let (respond_to, response) = oneshot::channel();
		let mut tracker = self.lock();
		tracker.subscriptions.queued.push_back(PendingSubAck {
			filters,
			respond_to,
		});
		if let Err(err) = send() {
			tracker.subscriptions.queued.pop_back();
			return Err(err);
		}
		Ok(response)
	}

	pub(crate) fn enqueue_unsubscribe<E>(
		&self,
		send: impl FnOnce() -> Result<(), E>,
	) -> Result<oneshot::Receiver<AckResult>, E> {
		let (respond_to, response) = oneshot::channel();
		let mut tracker = self.lock();
		tracker.unsubscriptions.queued.push_back(respond_to);
		if let Err(err) = send() {
			tracker.unsubscriptions.queued.pop_back();
			return Err(err);
		}
		Ok(response)
	}

	/// `Outgoing::Publish`. Packet id 0 marks a QoS 0 publish, which is done
	/// once written; a known id is a retransmission after reconnect.
	pub(crate) fn publish_sent(&self, pkid: u16) {
		let mut tracker = self.lock();
		if pkid != 0 && tracker.publishes.in_flight.contains_key(&pkid) {
			debug!(pkid, "Publish retransmitted");
			return;
		}
		if pkid == 0 {
			match tracker.publishes.queued.pop_front() {
				| Some(respond_to) => {
					let _ = respond_to.send(Ok(()));
				}
				| None => warn!("Outgoing publish without a waiting request"),
			}
			return;
		}
		if !tracker.publishes.assign(pkid) {
			warn!(pkid, "Outgoing publish without a waiting request");
		}
	}

	/// PUBACK or PUBCOMP.
	pub(crate) fn publish_acked(&self, pkid: u16) {
		match self.lock().publishes.in_flight.remove(&pkid) {
			| Some(respond_to) => {
				let _ = respond_to.send(Ok(()));
			}
			| None => debug!(pkid, "Publish acknowledgement for unknown packet id"),
		}
	}

	pub(crate) fn subscribe_sent(&self, pkid: u16) {
		if !self.lock().subscriptions.assign(pkid) {
			warn!(pkid, "Outgoing subscribe without a waiting request");
		}
	}

	pub(crate) fn subscribe_acked(
		&self,
		pkid: u16,
		codes: &[SubscribeReasonCode],
	) {
		let Some(pending) = self.lock().subscriptions.in_flight.remove(&pkid)
		else {
			warn!(pkid, "SUBACK for unknown packet id");
			return;
		};
		let grants = pending
			.filters
			.into_iter()
			.enumerate()
			.map(|(i, topic)| TopicGrant {
				topic,
				qos: match codes.get(i) {
					| Some(SubscribeReasonCode::Success(qos)) => Some(*qos),
					| _ => None,
				},
			})
			.collect();
		let _ = pending.respond_to.send(Ok(grants));
	}

	pub(crate) fn unsubscribe_sent(&self, pkid: u16) {
		if !self.lock().unsubscriptions.assign(pkid) {
			warn!(pkid, "Outgoing unsubscribe without a waiting request");
		}
	}

	pub(crate) fn unsubscribe_acked(&self, pkid: u16) {
		match self.lock().unsubscriptions.in_flight.remove(&pkid) {
			| Some(respond_to) => {
				let _ = respond_to.send(Ok(()));
			}
			| None => warn!(pkid, "UNSUBACK for unknown packet id"),
		}
	}

	/// Connection lost. Written subscribe and unsubscribe requests are not
	/// retransmitted, so they fail; in-flight publishes are resent by the
	/// event loop and requests still in the channel are written after the
	/// reconnect.
	pub(crate) fn connection_lost(&self) {
		let mut tracker = self.lock();
		tracker.subscriptions.fail_in_flight();
		tracker.unsubscriptions.fail_in_flight();
	}

	/// Fails every outstanding request with [`TransportError::Closed`].
	pub(crate) fn fail_all(&self) {
		let mut tracker = self.lock();
		tracker.publishes.fail_all();
		tracker.subscriptions.fail_all();
		tracker.unsubscriptions.fail_all();
	}
}

#[cfg(test)]
mod tests {
	use rumqttc::QoS;

	use super::*;

	fn sent() -> Result<(), ()> {
		Ok(())
	}

	#[tokio::test]
	async fn test_suback_resolves_in_request_order() {
		let tracker = AckTracker::default();
		let first = tracker
			.enqueue_subscribe(vec![ArcStr::from("a/+")], sent)
			.unwrap();
		let second = tracker
			.enqueue_subscribe(vec![ArcStr::from("b/#"), ArcStr::from("c")], sent)
			.unwrap();

		tracker.subscribe_sent(7);
		tracker.subscribe_sent(8);
		tracker.subscribe_acked(8, &[
			SubscribeReasonCode::Success(QoS::AtLeastOnce),
			SubscribeReasonCode::Failure,
		]);
		tracker.subscribe_acked(7, &[SubscribeReasonCode::Success(
			QoS::AtMostOnce,
		)]);

		let first = first.await.unwrap().unwrap();
		assert_eq!(first, vec![TopicGrant {
			topic: ArcStr::from("a/+"),
			qos: Some(QoS::AtMostOnce),
		}]);
		let second = second.await.unwrap().unwrap();
		assert_eq!(second[0].qos, Some(QoS::AtLeastOnce));
		assert_eq!(second[1].qos, None);
	}

	#[tokio::test]
	async fn test_failed_send_is_not_queued() {
		let tracker = AckTracker::default();
		let result =
			tracker.enqueue_subscribe(vec![ArcStr::from("a")], || Err("full"));
		assert!(result.is_err());

		let ok = tracker
			.enqueue_subscribe(vec![ArcStr::from("b")], || Ok::<_, &str>(()))
			.unwrap();
		tracker.subscribe_sent(1);
		tracker.subscribe_acked(1, &[SubscribeReasonCode::Success(
			QoS::AtMostOnce,
		)]);
		assert_eq!(ok.await.unwrap().unwrap()[0].topic.as_str(), "b");
	}

	#[tokio::test]
	async fn test_qos0_publish_resolves_once_written() {
		let tracker = AckTracker::default();
		let mut publish = tracker.enqueue_publish(sent).unwrap();
		assert!(publish.try_recv().is_err());

		tracker.publish_sent(0);

		assert_eq!(publish.await.unwrap(), Ok(()));
	}

	#[tokio::test]
	async fn test_publish_waits_for_acknowledgement() {
		let tracker = AckTracker::default();
		let mut first = tracker.enqueue_publish(sent).unwrap();
		let second = tracker.enqueue_publish(sent).unwrap();

		tracker.publish_sent(4);
		tracker.publish_sent(5);
		assert!(first.try_recv().is_err());

		// resent after a reconnect, keeps waiting for the same ack
		tracker.connection_lost();
		tracker.publish_sent(4);
		tracker.publish_acked(4);
		tracker.publish_acked(5);

		assert_eq!(first.await.unwrap(), Ok(()));
		assert_eq!(second.await.unwrap(), Ok(()));
	}

	#[tokio::test]
	async fn test_unsuback_resolves_unsubscribe() {
		let tracker = AckTracker::default();
		let unsubscribe = tracker.enqueue_unsubscribe(sent).unwrap();
		tracker.unsubscribe_sent(9);
		tracker.unsubscribe_acked(9);
		assert_eq!(unsubscribe.await.unwrap(), Ok(()));
	}

	#[tokio::test]
	async fn test_connection_lost_fails_written_subscriptions_only() {
		let tracker = AckTracker::default();
		let written = tracker
			.enqueue_subscribe(vec![ArcStr::from("a")], sent)
			.unwrap();
		let mut waiting = tracker
			.enqueue_subscribe(vec![ArcStr::from("b")], sent)
			.unwrap();
		let unsubscribe = tracker.enqueue_unsubscribe(sent).unwrap();
		tracker.subscribe_sent(1);
		tracker.unsubscribe_sent(2);

		tracker.connection_lost();

		assert_eq!(written.await.unwrap(), Err(TransportError::Closed));
		assert_eq!(unsubscribe.await.unwrap(), Err(TransportError::Closed));
		assert!(waiting.try_recv().is_err());

		tracker.subscribe_sent(3);
		tracker.subscribe_acked(3, &[SubscribeReasonCode::Success(
			QoS::AtMostOnce,
		)]);
		assert_eq!(waiting.await.unwrap().unwrap()[0].topic.as_str(), "b");
	}

	#[tokio::test]
	async fn test_fail_all_reports_closed() {
		let tracker = AckTracker::default();
		let in_flight = tracker
			.enqueue_subscribe(vec![ArcStr::from("a")], sent)
			.unwrap();
		let queued = tracker
			.enqueue_subscribe(vec![ArcStr::from("b")], sent)
			.unwrap();
		let publish = tracker.enqueue_publish(sent).unwrap();
		let unsubscribe = tracker.enqueue_unsubscribe(sent).unwrap();
		tracker.subscribe_sent(3);
		tracker.publish_sent(4);

		tracker.fail_all();

		assert_eq!(queued.await.unwrap(), Err(TransportError::Closed));
		assert_eq!(in_flight.await.unwrap(), Err(TransportError::Closed));
		assert_eq!(publish.await.unwrap(), Err(TransportError::Closed));
		assert_eq!(unsubscribe.await.unwrap(), Err(TransportError::Closed));
	}
}
