//! In-memory transport scripted by the tests
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use mqtt_pattern_router::{
	ClientEvent, ConnAck, IncomingMessage, PublishOptions, Session,
	SubscribeOptions, TopicGrant, Transport, TransportError, TransportEvent,
};
use mqtt_pattern_router::transport::Connection;
use arcstr::ArcStr;
use tokio::sync::{broadcast, mpsc};

/// What the broker does with the next connect call
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
	/// Acknowledge with the given `session_present` flag
	Ack(bool),
	/// Report a transport error instead of acknowledging
	Fail(TransportError),
	/// Close the session before acknowledging
	Close,
	/// Never answer
	Hang,
	/// Refuse to open the session at all
	Reject(TransportError),
}

/// Request recorded by a mock session
#[derive(Debug, Clone, PartialEq)]
pub enum Op {
	Publish {
		topic: String,
		payload: Bytes,
		options: PublishOptions,
	},
	Subscribe {
		filters: Vec<String>,
		options: SubscribeOptions,
	},
	Unsubscribe {
		filters: Vec<String>,
	},
	End {
		force: bool,
	},
}

impl Op {
	pub fn publish(topic: &str, payload: &str) -> Self {
		Op::Publish {
			topic: topic.to_string(),
			payload: Bytes::copy_from_slice(payload.as_bytes()),
			options: PublishOptions::default(),
		}
	}

	pub fn subscribe(filters: &[&str]) -> Self {
		Op::Subscribe {
			filters: filters.iter().map(|f| f.to_string()).collect(),
			options: SubscribeOptions::default(),
		}
	}

	pub fn unsubscribe(filters: &[&str]) -> Self {
		Op::Unsubscribe {
			filters: filters.iter().map(|f| f.to_string()).collect(),
		}
	}
}

#[derive(Default)]
struct BrokerState {
	ops: Vec<Op>,
	behaviors: VecDeque<ConnectBehavior>,
	addresses: Vec<String>,
	events: Option<mpsc::Sender<TransportEvent>>,
	failures: VecDeque<TransportError>,
	subscribe_delay: Option<Duration>,
}

/// Shared view on everything the mock sessions did
#[derive(Clone, Default)]
pub struct MockBroker {
	state: Arc<Mutex<BrokerState>>,
}

impl MockBroker {
	fn lock(&self) -> MutexGuard<'_, BrokerState> {
		self.state.lock().unwrap()
	}

	pub fn transport(&self) -> MockTransport {
		MockTransport {
			broker: self.clone(),
		}
	}

	/// Script the next connect; unscripted connects are acknowledged with
	/// `session_present = false`.
	pub fn on_connect(&self, behavior: ConnectBehavior) {
		self.lock().behaviors.push_back(behavior);
	}

	/// The next request fails with `err`.
	pub fn fail_next(&self, err: TransportError) {
		self.lock().failures.push_back(err);
	}

	/// Subscribe requests wait for `delay` before reaching the broker.
	pub fn delay_subscribes(&self, delay: Duration) {
		self.lock().subscribe_delay = Some(delay);
	}

	pub fn ops(&self) -> Vec<Op> {
		self.lock().ops.clone()
	}

	pub fn clear_ops(&self) {
		self.lock().ops.clear();
	}

	pub fn addresses(&self) -> Vec<String> {
		self.lock().addresses.clone()
	}

	/// Pushes an event into the latest session's stream.
	pub async fn emit(&self, event: TransportEvent) {
		let events = self.lock().events.clone().expect("no session opened");
		events.send(event).await.expect("session event stream closed");
	}

	pub async fn deliver(&self, topic: &str, payload: &str) {
		self.emit(TransportEvent::Message(IncomingMessage::new(
			ArcStr::from(topic),
			Bytes::copy_from_slice(payload.as_bytes()),
		)))
		.await;
	}

	fn record(&self, op: Op) -> Result<(), TransportError> {
		let mut state = self.lock();
		state.ops.push(op);
		match state.failures.pop_front() {
			| Some(err) => Err(err),
			| None => Ok(()),
		}
	}
}

pub struct MockTransport {
	broker: MockBroker,
}

impl Transport for MockTransport {
	type Session = MockSession;

	async fn connect(
		&self,
		address: &str,
	) -> Result<Connection<MockSession>, TransportError> {
		let behavior = {
			let mut state = self.broker.lock();
			state.addresses.push(address.to_string());
			state
				.behaviors
				.pop_front()
				.unwrap_or(ConnectBehavior::Ack(false))
		};
		let (events_tx, events_rx) = mpsc::channel(64);
		let first = match behavior {
			| ConnectBehavior::Ack(session_present) => {
				Some(TransportEvent::Connect(ConnAck { session_present }))
			}
			| ConnectBehavior::Fail(err) => Some(TransportEvent::Error(err)),
			| ConnectBehavior::Close => Some(TransportEvent::Close),
			| ConnectBehavior::Hang => None,
			| ConnectBehavior::Reject(err) => return Err(err),
		};
		if let Some(event) = first {
			events_tx.try_send(event).expect("fresh channel has room");
		}
		self.broker.lock().events = Some(events_tx.clone());

		Ok(Connection {
			session: MockSession {
				broker: self.broker.clone(),
				events: events_tx,
			},
			events: events_rx,
		})
	}
}

pub struct MockSession {
	broker: MockBroker,
	events: mpsc::Sender<TransportEvent>,
}

impl Session for MockSession {
	async fn publish(
		&self,
		topic: ArcStr,
		payload: Bytes,
		options: PublishOptions,
	) -> Result<(), TransportError> {
		self.broker.record(Op::Publish {
			topic: topic.to_string(),
			payload,
			options,
		})
	}

	async fn subscribe(
		&self,
		filters: Vec<ArcStr>,
		options: SubscribeOptions,
	) -> Result<Vec<TopicGrant>, TransportError> {
		let delay = self.broker.lock().subscribe_delay;
		if let Some(delay) = delay {
			tokio::time::sleep(delay).await;
		}
		self.broker.record(Op::Subscribe {
			filters: filters.iter().map(ArcStr::to_string).collect(),
			options,
		})?;
		Ok(filters
			.into_iter()
			.map(|topic| TopicGrant {
				topic,
				qos: Some(options.qos),
			})
			.collect())
	}

	async fn unsubscribe(
		&self,
		filters: Vec<ArcStr>,
	) -> Result<(), TransportError> {
		self.broker.record(Op::Unsubscribe {
			filters: filters.iter().map(ArcStr::to_string).collect(),
		})
	}

	async fn end(&self, force: bool) -> Result<(), TransportError> {
		self.broker.record(Op::End { force })?;
		let _ = self.events.try_send(TransportEvent::Close);
		Ok(())
	}
}

/// Next event, failing the test after one second.
pub async fn next_event(
	events: &mut broadcast::Receiver<ClientEvent>,
) -> ClientEvent {
	tokio::time::timeout(Duration::from_secs(1), events.recv())
		.await
		.expect("timed out waiting for an event")
		.expect("event channel closed")
}

/// Polls `check` until it holds, failing the test after one second.
pub async fn eventually(mut check: impl FnMut() -> bool) {
	for _ in 0..200 {
		if check() {
			return;
		}
		tokio::time::sleep(Duration::from_millis(5)).await;
	}
	panic!("condition not met within one second");
}

/// Value received from a handler channel, failing after one second.
pub async fn received<T>(rx: &mut mpsc::UnboundedReceiver<T>) -> T {
	tokio::time::timeout(Duration::from_secs(1), rx.recv())
		.await
		.expect("timed out waiting for the handler")
		.expect("handler channel closed")
}

/// Asserts that nothing arrives within 50ms.
pub async fn nothing_received<T: std::fmt::Debug>(
	rx: &mut mpsc::UnboundedReceiver<T>,
) {
	if let Ok(value) =
		tokio::time::timeout(Duration::from_millis(50), rx.recv()).await
	{
		panic!("unexpected handler invocation: {value:?}");
	}
}

pub fn strings(items: Vec<ArcStr>) -> Vec<String> {
	items.iter().map(ArcStr::to_string).collect()
}
