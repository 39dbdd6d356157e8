//! Transport backed by `rumqttc`
//!
//! A spawned task drives the `rumqttc` event loop and translates what it sees
//! into [`TransportEvent`]s. Requests go through the `AsyncClient` handle.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::Event::{Incoming, Outgoing};
use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{AsyncClient, ConnectReturnCode, EventLoop, MqttOptions, SubscribeFilter};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::ack_tracker::AckTracker;
use super::{
	ConnAck, Connection, IncomingMessage, PublishOptions, Session,
	SubscribeOptions, TopicGrant, Transport, TransportError, TransportEvent,
};

/// Connection and event loop settings for [`RumqttcTransport`].
#[derive(Debug, Clone)]
pub struct RumqttcSettings {
	/// MQTT keep-alive interval
	pub keep_alive: Duration,
	/// Ask the broker for a clean session
	pub clean_session: bool,
	/// Capacity of the `rumqttc` request channel
	pub request_channel_capacity: usize,
	/// Capacity of the channel carrying transport events to the client
	pub event_channel_capacity: usize,
	/// Consecutive event loop errors tolerated before the session closes
	pub max_consecutive_errors: u32,
	/// First reconnect delay; doubles on every consecutive failure
	pub initial_retry_delay: Duration,
	/// Upper bound for the reconnect delay
	pub max_retry_delay: Duration,
	/// Username and password sent with CONNECT
	pub credentials: Option<(String, String)>,
}

impl Default for RumqttcSettings {
	fn default() -> Self {
		Self {
			keep_alive: Duration::from_secs(60),
			clean_session: true,
			request_channel_capacity: 10,
			event_channel_capacity: 100,
			max_consecutive_errors: 10,
			initial_retry_delay: Duration::from_millis(100),
			max_retry_delay: Duration::from_secs(30),
			credentials: None,
		}
	}
}

impl RumqttcSettings {
	/// Reconnect delay after `error_count` consecutive failures.
	pub fn retry_delay(&self, error_count: u32) -> Duration {
		let factor = 2_u32.pow(error_count.saturating_sub(1).min(10));
		(self.initial_retry_delay * factor).min(self.max_retry_delay)
	}
}

/// [`Transport`] implementation on top of `rumqttc`.
///
/// Addresses are MQTT URLs understood by `MqttOptions::parse_url`, e.g.
/// `mqtt://broker.hivemq.com:1883?client_id=router`.
#[derive(Debug, Clone, Default)]
pub struct RumqttcTransport {
	settings: RumqttcSettings,
}

impl RumqttcTransport {
	/// Transport with default settings.
	pub fn new() -> Self {
		Self::default()
	}

	/// Transport with custom settings.
	pub fn with_settings(settings: RumqttcSettings) -> Self {
		Self { settings }
	}

	/// Current settings.
	pub fn settings(&self) -> &RumqttcSettings {
		&self.settings
	}

	fn options(&self, address: &str) -> Result<MqttOptions, TransportError> {
		let mut options = MqttOptions::parse_url(address)
			.map_err(|err| TransportError::Configuration(err.to_string()))?;
		options.set_keep_alive(self.settings.keep_alive);
		options.set_clean_session(self.settings.clean_session);
		if let Some((username, password)) = &self.settings.credentials {
			options.set_credentials(username, password);
		}
		Ok(options)
	}
}

impl Transport for RumqttcTransport {
	type Session = RumqttcSession;

	async fn connect(
		&self,
		address: &str,
	) -> Result<Connection<RumqttcSession>, TransportError> {
		if self.settings.request_channel_capacity == 0
			|| self.settings.event_channel_capacity == 0
		{
			return Err(TransportError::Configuration(
				"channel capacities must be greater than 0".to_string(),
			));
		}
		let options = self.options(address)?;
		let (client, event_loop) =
			AsyncClient::new(options, self.settings.request_channel_capacity);
		let (events_tx, events_rx) =
			mpsc::channel(self.settings.event_channel_capacity);
		let acks = Arc::new(AckTracker::default());

		let driver = EventLoopDriver {
			event_loop,
			events: events_tx,
			acks: Arc::clone(&acks),
			settings: self.settings.clone(),
		};
		let handle = tokio::spawn(driver.run());
		debug!(address, "Spawned MQTT event loop");

		Ok(Connection {
			session: RumqttcSession {
				client,
				acks,
				event_loop_handle: Mutex::new(Some(handle)),
			},
			events: events_rx,
		})
	}
}

/// Session handle of [`RumqttcTransport`].
///
/// Dropping it aborts the event loop task.
pub struct RumqttcSession {
	client: AsyncClient,
	acks: Arc<AckTracker>,
	event_loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl RumqttcSession {
	fn take_event_loop(&self) -> Option<JoinHandle<()>> {
		self.event_loop_handle
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
	}
}

impl Session for RumqttcSession {
	/// Resolves once the broker acknowledged the publish for its QoS.
	/// `dup` is managed by `rumqttc` itself and ignored here.
	async fn publish(
		&self,
		topic: ArcStr,
		payload: Bytes,
		options: PublishOptions,
	) -> Result<(), TransportError> {
		let response = self
			.acks
			.enqueue_publish(|| {
				self.client.try_publish(
					topic.as_str(),
					options.qos,
					options.retain,
					payload.to_vec(),
				)
			})
			.map_err(|err| TransportError::Request(err.to_string()))?;
		response.await.map_err(|_| TransportError::Closed)?
	}

	async fn subscribe(
		&self,
		filters: Vec<ArcStr>,
		options: SubscribeOptions,
	) -> Result<Vec<TopicGrant>, TransportError> {
		let request: Vec<SubscribeFilter> = filters
			.iter()
			.map(|filter| SubscribeFilter::new(filter.to_string(), options.qos))
			.collect();
		let response = self
			.acks
			.enqueue_subscribe(filters, || {
				self.client.try_subscribe_many(request)
			})
			.map_err(|err| TransportError::Request(err.to_string()))?;
		response.await.map_err(|_| TransportError::Closed)?
	}

	/// One UNSUBSCRIBE per filter; resolves once every UNSUBACK arrived.
	async fn unsubscribe(
		&self,
		filters: Vec<ArcStr>,
	) -> Result<(), TransportError> {
		let mut responses = Vec::with_capacity(filters.len());
		for filter in &filters {
			let response = self
				.acks
				.enqueue_unsubscribe(|| {
					self.client.try_unsubscribe(filter.as_str())
				})
				.map_err(|err| TransportError::Request(err.to_string()))?;
			responses.push(response);
		}
		for response in responses {
			response.await.map_err(|_| TransportError::Closed)??;
		}
		Ok(())
	}

	async fn end(&self, force: bool) -> Result<(), TransportError> {
		let Some(handle) = self.take_event_loop() else {
			return Err(TransportError::Closed);
		};

		if force {
			handle.abort();
		} else if let Err(err) = self.client.disconnect().await {
			warn!(error = %err, "Failed to send MQTT Disconnect, aborting event loop");
			handle.abort();
		}

		if let Err(err) = handle.await {
			if !err.is_cancelled() {
				warn!(error = %err, "Event loop task failed");
			}
		}
		self.acks.fail_all();
		Ok(())
	}
}

impl Drop for RumqttcSession {
	fn drop(&mut self) {
		if let Some(handle) = self.take_event_loop() {
			debug!("RumqttcSession dropped while running, aborting event loop");
			handle.abort();
		}
	}
}

struct EventLoopDriver {
	event_loop: EventLoop,
	events: mpsc::Sender<TransportEvent>,
	acks: Arc<AckTracker>,
	settings: RumqttcSettings,
}

impl EventLoopDriver {
	/// Returns false once nobody listens anymore.
	async fn emit(&mut self, event: TransportEvent) -> bool {
		self.events.send(event).await.is_ok()
	}

	/// Polls until DISCONNECT, too many errors, or the client side goes away.
	async fn run(mut self) {
		let mut error_count = 0;
		let mut online = false;

		loop {
			let keep_going = match self.event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ack))) => {
					error_count = 0;
					if ack.code == ConnectReturnCode::Success {
						online = true;
						info!(
							session_present = ack.session_present,
							"MQTT connection acknowledged"
						);
						self.emit(TransportEvent::Connect(ConnAck {
							session_present: ack.session_present,
						}))
						.await
					} else {
						warn!(code = ?ack.code, "MQTT connection rejected by broker");
						self.emit(TransportEvent::Error(TransportError::Refused(
							format!("{:?}", ack.code),
						)))
						.await
					}
				}
				| Ok(Incoming(Publish(p))) => {
					error_count = 0;
					debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
					self.emit(TransportEvent::Message(IncomingMessage {
						topic: ArcStr::from(p.topic),
						payload: p.payload,
						qos: p.qos,
						retain: p.retain,
						dup: p.dup,
					}))
					.await
				}
				| Ok(Incoming(Packet::SubAck(ack))) => {
					self.acks.subscribe_acked(ack.pkid, &ack.return_codes);
					true
				}
				| Ok(Incoming(Packet::UnsubAck(ack))) => {
					self.acks.unsubscribe_acked(ack.pkid);
					true
				}
				| Ok(Incoming(Packet::PubAck(ack))) => {
					self.acks.publish_acked(ack.pkid);
					true
				}
				| Ok(Incoming(Packet::PubComp(ack))) => {
					self.acks.publish_acked(ack.pkid);
					true
				}
				| Ok(Outgoing(rumqttc::Outgoing::Publish(pkid))) => {
					self.acks.publish_sent(pkid);
					true
				}
				| Ok(Outgoing(rumqttc::Outgoing::Subscribe(pkid))) => {
					self.acks.subscribe_sent(pkid);
					true
				}
				| Ok(Outgoing(rumqttc::Outgoing::Unsubscribe(pkid))) => {
					self.acks.unsubscribe_sent(pkid);
					true
				}
				| Ok(Incoming(Disconnect)) => {
					info!("Received MQTT Disconnect packet from server");
					false
				}
				| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
					info!("Sent MQTT Disconnect packet to server");
					false
				}
				| Ok(notification) => {
					error_count = 0;
					debug!(notification = ?notification, "Received other MQTT notification");
					true
				}
				| Err(err) => {
					error_count += 1;
					error!(error_count, error = %err, "MQTT event loop error");
					self.acks.connection_lost();
					self.handle_error(err, &mut online, error_count).await
				}
			};
			if !keep_going {
				break;
			}
		}

		self.acks.fail_all();
		let _ = self.emit(TransportEvent::Close).await;
		info!("MQTT event loop terminated");
	}

	async fn handle_error(
		&mut self,
		err: rumqttc::ConnectionError,
		online: &mut bool,
		error_count: u32,
	) -> bool {
		let reported = self
			.emit(TransportEvent::Error(TransportError::Connection(
				err.to_string(),
			)))
			.await;
		if !reported {
			return false;
		}
		if std::mem::take(online) && !self.emit(TransportEvent::Offline).await {
			return false;
		}
		if error_count >= self.settings.max_consecutive_errors {
			error!(
				error_count,
				max_errors = self.settings.max_consecutive_errors,
				"Too many consecutive errors, terminating event loop"
			);
			return false;
		}

		let delay = self.settings.retry_delay(error_count);
		warn!(delay = ?delay, error_count, "Retrying MQTT connection");
		time::sleep(delay).await;
		self.emit(TransportEvent::Reconnect).await
	}
}
