use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, Weak};
use std::time::Duration;

use arcstr::ArcStr;
use tokio::sync::{broadcast, mpsc, watch};
use tokio::time;
use tracing::{debug, error, info, warn};

use super::config::ClientSettings;
use super::error::ClientError;
use super::event::{ClientEvent, ConnectionState};
use super::message::Message;
use super::payload::Payload;
use super::pending::{
	PendingPublish, PendingQueue, PendingSubscribe, PendingSummary,
};
use crate::routing::Route;
use crate::topic::{TopicPattern, Topics, validate_publish_topic};
use crate::transport::{
	ConnAck, Connection, PublishOptions, Session, SubscribeOptions, TopicGrant,
	Transport, TransportEvent,
};

/// Result of a publish call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
	/// Accepted by the active session
	Delivered,
	/// No session was connected; replayed after the next clean connect
	Queued,
}

/// Result of a subscribe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Grant {
	/// No session was connected; replayed after the next clean connect
	Queued,
	/// Per-filter answer of the broker
	Granted(Vec<TopicGrant>),
}

impl Grant {
	/// Broker grants, empty while queued.
	pub fn grants(&self) -> &[TopicGrant] {
		match self {
			| Grant::Queued => &[],
			| Grant::Granted(grants) => grants.as_slice(),
		}
	}

	pub fn is_queued(&self) -> bool {
		matches!(self, Grant::Queued)
	}
}

/// Connection facade.
///
/// Wraps one [`Transport`] and keeps a logical client alive across the
/// sessions it opens. While no session is connected, publishes and
/// subscriptions are queued and replayed newest first after the next
/// connection acknowledgement that did not resume a session. Inbound
/// messages are offered to the attached [`Route`]s in order; unclaimed ones
/// are emitted as [`ClientEvent::Message`].
///
/// Cloning is cheap and every clone drives the same connection.
pub struct MqttClient<T: Transport> {
	inner: Arc<ClientInner<T>>,
}

impl<T: Transport> Clone for MqttClient<T> {
	fn clone(&self) -> Self {
		Self {
			inner: Arc::clone(&self.inner),
		}
	}
}

impl<T: Transport> fmt::Debug for MqttClient<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("MqttClient")
			.field("state", &self.state())
			.field("pending", &self.pending_operations())
			.field("settings", &self.inner.settings)
			.finish()
	}
}

struct ClientInner<T: Transport> {
	transport: T,
	settings: ClientSettings,
	shared: Mutex<Shared<T::Session>>,
	state: watch::Sender<ConnectionState>,
	events: broadcast::Sender<ClientEvent>,
	routes: RwLock<Vec<Arc<dyn Route>>>,
}

/// Session, state and queues change together under one lock.
struct Shared<S> {
	session: Option<Arc<S>>,
	state: ConnectionState,
	pending: PendingQueue,
	granted: Vec<GrantedFilter>,
}

#[derive(Debug, Clone)]
struct GrantedFilter {
	filter: ArcStr,
	options: SubscribeOptions,
}

impl<S> Shared<S> {
	fn active_session(&self) -> Option<Arc<S>> {
		match self.state {
			| ConnectionState::Connected => self.session.clone(),
			| _ => None,
		}
	}

	fn is_current(&self, session: &Arc<S>) -> bool {
		self.session
			.as_ref()
			.is_some_and(|current| Arc::ptr_eq(current, session))
	}
}

impl<T: Transport> MqttClient<T> {
	/// Client with default settings.
	pub fn new(transport: T) -> Self {
		Self::build(transport, ClientSettings::default())
	}

	/// Client with custom settings, rejecting zero timeouts and capacities.
	pub fn with_settings(
		transport: T,
		settings: ClientSettings,
	) -> Result<Self, ClientError> {
		settings.validate()?;
		Ok(Self::build(transport, settings))
	}

	fn build(transport: T, settings: ClientSettings) -> Self {
		let (events, _) = broadcast::channel(settings.event_channel_capacity);
		let (state, _) = watch::channel(ConnectionState::Idle);
		Self {
			inner: Arc::new(ClientInner {
				transport,
				settings,
				shared: Mutex::new(Shared {
					session: None,
					state: ConnectionState::Idle,
					pending: PendingQueue::default(),
					granted: Vec::new(),
				}),
				state,
				events,
				routes: RwLock::new(Vec::new()),
			}),
		}
	}

	/// Opens a session and waits for its connection acknowledgement.
	///
	/// Queued operations are replayed before this returns unless the broker
	/// resumed a previous session. The replay runs in its own task and
	/// finishes even if this future is dropped.
	pub async fn connect(&self, address: &str) -> Result<ConnAck, ClientError> {
		let mut attempt = ConnectAttempt::begin(&self.inner)?;
		let timeout_millis = self.inner.settings.connection_timeout_millis;

		let (session, events, ack) = self
			.inner
			.establish(address, timeout_millis)
			.await?;

		self.inner.attach_session(Arc::clone(&session));
		attempt.complete();
		tokio::spawn(pump(
			Arc::downgrade(&self.inner),
			Arc::clone(&session),
			events,
		));

		info!(
			address,
			session_present = ack.session_present,
			"MQTT session established"
		);
		self.inner.emit(ClientEvent::Connect(ack));
		let inner = Arc::clone(&self.inner);
		let replay = tokio::spawn(async move {
			inner.restore(&session, ack).await;
		});
		if let Err(err) = replay.await {
			error!(error = %err, "Replay task failed");
		}
		Ok(ack)
	}

	/// Publishes with default options (QoS 0, not retained).
	pub async fn publish(
		&self,
		topic: &str,
		payload: impl Into<Payload>,
	) -> Result<PublishOutcome, ClientError> {
		self.publish_with_options(topic, payload, PublishOptions::default())
			.await
	}

	pub async fn publish_with_options(
		&self,
		topic: &str,
		payload: impl Into<Payload>,
		options: PublishOptions,
	) -> Result<PublishOutcome, ClientError> {
		validate_publish_topic(topic)?;
		let payload: Payload = payload.into();
		let payload = payload.encode()?;
		let topic = ArcStr::from(topic);

		let session = {
			let mut shared = self.inner.lock();
			match shared.active_session() {
				| Some(session) => session,
				| None => {
					debug!(topic = %topic, "No connected session, publish queued");
					shared.pending.push_publish(PendingPublish {
						topic,
						payload,
						options,
					});
					return Ok(PublishOutcome::Queued);
				}
			}
		};

		session.publish(topic, payload, options).await?;
		Ok(PublishOutcome::Delivered)
	}

	/// Subscribes with default options (QoS 0).
	pub async fn subscribe(
		&self,
		topics: impl Into<Topics>,
	) -> Result<Grant, ClientError> {
		self.subscribe_with_options(topics, SubscribeOptions::default())
			.await
	}

	/// Subscribes to one or more filters.
	///
	/// Filters are validated as patterns and sent in their normalized form,
	/// so `a/+id` subscribes to `a/+`.
	pub async fn subscribe_with_options(
		&self,
		topics: impl Into<Topics>,
		options: SubscribeOptions,
	) -> Result<Grant, ClientError> {
		let filters = transport_filters(&topics.into())?;

		let session = {
			let mut shared = self.inner.lock();
			match shared.active_session() {
				| Some(session) => session,
				| None => {
					debug!(filters = ?filters, "No connected session, subscription queued");
					shared
						.pending
						.push_subscribe(PendingSubscribe { filters, options });
					return Ok(Grant::Queued);
				}
			}
		};

		let grants = session.subscribe(filters, options).await?;
		self.inner.remember_grants(&grants, options);
		Ok(Grant::Granted(grants))
	}

	/// Removes subscriptions. Not queued: fails with
	/// [`ClientError::NotConnected`] unless a session is connected.
	pub async fn unsubscribe(
		&self,
		topics: impl Into<Topics>,
	) -> Result<(), ClientError> {
		let filters = transport_filters(&topics.into())?;
		let session = self
			.inner
			.lock()
			.active_session()
			.ok_or(ClientError::NotConnected)?;

		session.unsubscribe(filters.clone()).await?;
		self.inner
			.lock()
			.granted
			.retain(|granted| !filters.contains(&granted.filter));
		Ok(())
	}

	/// Closes the session, gracefully or by tearing it down.
	///
	/// Fails with [`ClientError::NotConnected`] unless a session is connected.
	pub async fn end(&self, force: bool) -> Result<(), ClientError> {
		let session = self
			.inner
			.lock()
			.active_session()
			.ok_or(ClientError::NotConnected)?;

		info!(force, "Ending MQTT session");
		let result = session.end(force).await;
		self.inner.session_closed(&session);
		result.map_err(ClientError::from)
	}

	/// Lifecycle events and unrouted messages emitted from now on.
	pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
		self.inner.events.subscribe()
	}

	pub fn state(&self) -> ConnectionState {
		*self.inner.state.borrow()
	}

	/// Receiver notified on every state transition.
	pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
		self.inner.state.subscribe()
	}

	pub fn connected(&self) -> bool {
		self.state().is_connected()
	}

	pub fn reconnecting(&self) -> bool {
		self.state().is_reconnecting()
	}

	/// Appends a route to the end of the dispatch chain.
	pub fn use_route(&self, route: impl Route) {
		self.inner
			.routes
			.write()
			.unwrap_or_else(PoisonError::into_inner)
			.push(Arc::new(route));
	}

	/// Operations waiting for the next clean connect.
	pub fn pending_operations(&self) -> PendingSummary {
		self.inner.lock().pending.summary()
	}

	pub fn settings(&self) -> &ClientSettings {
		&self.inner.settings
	}
}

/// Validated, normalized filters for the transport.
fn transport_filters(topics: &Topics) -> Result<Vec<ArcStr>, ClientError> {
	topics.validate()?;
	topics
		.iter()
		.map(|topic| {
			TopicPattern::parse(topic.clone())
				.map(|pattern| pattern.normalized().clone())
				.map_err(ClientError::from)
		})
		.collect()
}

type Established<S> = (Arc<S>, mpsc::Receiver<TransportEvent>, ConnAck);

impl<T: Transport> ClientInner<T> {
	fn lock(&self) -> MutexGuard<'_, Shared<T::Session>> {
		self.shared.lock().unwrap_or_else(PoisonError::into_inner)
	}

	fn set_state(
		&self,
		shared: &mut Shared<T::Session>,
		state: ConnectionState,
	) {
		if shared.state != state {
			debug!(from = ?shared.state, to = ?state, "Connection state changed");
		}
		shared.state = state;
		self.state.send_replace(state);
	}

	/// Changes state only if `session` is still the current one.
	fn update_state(
		&self,
		session: &Arc<T::Session>,
		state: ConnectionState,
	) -> bool {
		let mut shared = self.lock();
		if !shared.is_current(session) {
			return false;
		}
		self.set_state(&mut shared, state);
		true
	}

	fn emit(&self, event: ClientEvent) {
		// Err only means nobody listens right now
		let _ = self.events.send(event);
	}

	/// Opens a session and waits for the first `Connect` event.
	///
	/// A session that does not acknowledge within `timeout_millis` is
	/// force-ended.
	async fn establish(
		&self,
		address: &str,
		timeout_millis: u64,
	) -> Result<Established<T::Session>, ClientError> {
		let deadline =
			time::Instant::now() + Duration::from_millis(timeout_millis);
		let Connection {
			session,
			mut events,
		} = time::timeout_at(deadline, self.transport.connect(address))
			.await
			.map_err(|_| ClientError::ConnectTimeout { timeout_millis })??;

		let ack = match time::timeout_at(deadline, acknowledgement(&mut events))
			.await
		{
			| Ok(Ok(ack)) => ack,
			| Ok(Err(err)) => {
				discard(&session).await;
				return Err(err);
			}
			| Err(_) => {
				debug!(timeout_millis, "No connection acknowledgement in time");
				discard(&session).await;
				return Err(ClientError::ConnectTimeout { timeout_millis });
			}
		};
		Ok((Arc::new(session), events, ack))
	}

	fn attach_session(&self, session: Arc<T::Session>) {
		let mut shared = self.lock();
		shared.session = Some(session);
		self.set_state(&mut shared, ConnectionState::Connected);
	}

	fn remember_grants(&self, grants: &[TopicGrant], options: SubscribeOptions) {
		let mut shared = self.lock();
		for grant in grants.iter().filter(|grant| grant.qos.is_some()) {
			match shared
				.granted
				.iter_mut()
				.find(|granted| granted.filter == grant.topic)
			{
				| Some(granted) => granted.options = options,
				| None => shared.granted.push(GrantedFilter {
					filter: grant.topic.clone(),
					options,
				}),
			}
		}
	}

	/// Brings a session up to date after a connection acknowledgement.
	///
	/// A resumed session keeps everything as is. Otherwise granted filters
	/// are subscribed again, then queued subscriptions and publishes are
	/// replayed newest first.
	async fn restore(&self, session: &T::Session, ack: ConnAck) {
		if ack.session_present {
			info!(
				pending = ?self.lock().pending.summary(),
				"MQTT session resumed, subscriptions maintained by broker"
			);
			return;
		}

		let (granted, subscriptions, publishes) = {
			let mut shared = self.lock();
			let (subscriptions, publishes) = shared.pending.drain_lifo();
			(shared.granted.clone(), subscriptions, publishes)
		};

		if !granted.is_empty() {
			info!(
				count = granted.len(),
				"MQTT connected without session, resubscribing to all topics"
			);
		}
		for GrantedFilter { filter, options } in granted {
			if let Err(err) = session.subscribe(vec![filter.clone()], options).await
			{
				error!(topic = %filter, error = ?err, "Failed to resubscribe");
				self.emit(ClientEvent::Error(err));
			}
		}

		if !subscriptions.is_empty() || !publishes.is_empty() {
			info!(
				subscriptions = subscriptions.len(),
				publishes = publishes.len(),
				"Replaying queued operations"
			);
		}
		for PendingSubscribe { filters, options } in subscriptions {
			match session.subscribe(filters.clone(), options).await {
				| Ok(grants) => self.remember_grants(&grants, options),
				| Err(err) => {
					warn!(filters = ?filters, error = ?err, "Failed to replay queued subscription");
					self.emit(ClientEvent::Error(err));
				}
			}
		}
		for PendingPublish {
			topic,
			payload,
			options,
		} in publishes
		{
			if let Err(err) = session.publish(topic.clone(), payload, options).await
			{
				warn!(topic = %topic, error = ?err, "Failed to replay queued publish");
				self.emit(ClientEvent::Error(err));
			}
		}
	}

	fn dispatch(&self, message: Message) {
		let routes = self
			.routes
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone();
		if routes.iter().any(|route| route.handle(&message)) {
			return;
		}
		debug!(topic = %message.topic, "No route matched, emitting message");
		self.emit(ClientEvent::Message(message));
	}

	/// Forgets `session` if it is still current and emits `Close` once.
	fn session_closed(&self, session: &Arc<T::Session>) {
		{
			let mut shared = self.lock();
			if !shared.is_current(session) {
				return;
			}
			shared.session = None;
			self.set_state(&mut shared, ConnectionState::Closed);
		}
		info!("MQTT session closed");
		self.emit(ClientEvent::Close);
	}
}

/// Bootstrap phase: everything before the first `Connect` event.
async fn acknowledgement(
	events: &mut mpsc::Receiver<TransportEvent>,
) -> Result<ConnAck, ClientError> {
	loop {
		match events.recv().await {
			| Some(TransportEvent::Connect(ack)) => return Ok(ack),
			| Some(TransportEvent::Error(err)) => {
				debug!(error = %err, "Transport error before connection acknowledgement");
				return Err(err.into());
			}
			| Some(TransportEvent::Close) | None => {
				debug!("Session closed before connection acknowledgement");
				return Err(ClientError::ConnectionClosed);
			}
			| Some(event) => {
				debug!(event = ?event, "Bootstrap phase event");
			}
		}
	}
}

async fn discard<S: Session>(session: &S) {
	if let Err(err) = session.end(true).await {
		debug!(error = %err, "Failed to discard session");
	}
}

/// Rolls the state back when `connect` fails or its future is dropped.
struct ConnectAttempt<'a, T: Transport> {
	inner: &'a ClientInner<T>,
	previous: ConnectionState,
	done: bool,
}

impl<'a, T: Transport> ConnectAttempt<'a, T> {
	fn begin(inner: &'a ClientInner<T>) -> Result<Self, ClientError> {
		let mut shared = inner.lock();
		if shared.session.is_some()
			|| shared.state == ConnectionState::Connecting
		{
			return Err(ClientError::AlreadyConnected);
		}
		let previous = shared.state;
		inner.set_state(&mut shared, ConnectionState::Connecting);
		Ok(Self {
			inner,
			previous,
			done: false,
		})
	}

	fn complete(&mut self) {
		self.done = true;
	}
}

impl<T: Transport> Drop for ConnectAttempt<'_, T> {
	fn drop(&mut self) {
		if self.done {
			return;
		}
		let mut shared = self.inner.lock();
		if shared.session.is_none()
			&& shared.state == ConnectionState::Connecting
		{
			self.inner.set_state(&mut shared, self.previous);
		}
	}
}

/// Forwards one session's transport events into the client.
async fn pump<T: Transport>(
	client: Weak<ClientInner<T>>,
	session: Arc<T::Session>,
	mut events: mpsc::Receiver<TransportEvent>,
) {
	while let Some(event) = events.recv().await {
		let Some(inner) = client.upgrade() else {
			debug!("Client dropped, stopping event pump");
			return;
		};
		match event {
			| TransportEvent::Connect(ack) => {
				if inner.update_state(&session, ConnectionState::Connected) {
					info!(
						session_present = ack.session_present,
						"MQTT reconnected"
					);
					inner.emit(ClientEvent::Connect(ack));
					let session = Arc::clone(&session);
					// SUBACKs are read by the transport while this pump keeps
					// draining events, so replay must not block it
					tokio::spawn(async move {
						inner.restore(&session, ack).await;
					});
				}
			}
			| TransportEvent::Reconnect => {
				inner.update_state(&session, ConnectionState::Reconnecting);
				inner.emit(ClientEvent::Reconnect);
			}
			| TransportEvent::Offline => {
				if inner.update_state(&session, ConnectionState::Reconnecting) {
					warn!("MQTT connection lost");
				}
				inner.emit(ClientEvent::Offline);
			}
			| TransportEvent::Error(err) => {
				warn!(error = %err, "Transport reported an error");
				inner.emit(ClientEvent::Error(err));
			}
			| TransportEvent::Message(incoming) => {
				debug!(topic = %incoming.topic, payload_size = incoming.payload.len(), "Received MQTT message");
				inner.dispatch(Message::from(incoming));
			}
			| TransportEvent::Close => break,
		}
	}

	if let Some(inner) = client.upgrade() {
		inner.session_closed(&session);
	}
}
