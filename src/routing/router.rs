use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use arcstr::ArcStr;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};

use super::handler::Handler;
use super::registry::{Binding, Registry};
use super::route::Route;
use crate::client::{
	ClientError, ClientEvent, Grant, Message, MqttClient, Payload,
	PublishOutcome,
};
use crate::topic::{SEPARATOR, TopicPattern, Topics};
use crate::transport::{PublishOptions, SubscribeOptions, Transport};

/// Router construction options
#[derive(Debug, Clone, Default)]
pub struct RouterOptions {
	/// Prepended as `prefix/` to every pattern and topic of the router
	pub prefix: Option<String>,
}

impl RouterOptions {
	pub fn with_prefix(prefix: impl Into<String>) -> Self {
		Self {
			prefix: Some(prefix.into()),
		}
	}
}

/// Pattern router attached to an [`MqttClient`].
///
/// Bindings are tried in registration order and the first matching pattern
/// wins, across this router and every router attached after it. The
/// matched handler runs in a task of its own with the pattern's captures in
/// [`Message::params`].
///
/// ```no_run
/// # use mqtt_pattern_router::prelude::*;
/// # async fn demo(client: MqttClient<RumqttcTransport>) -> Result<()> {
/// let router = Router::new(&client, RouterOptions::with_prefix("home"));
/// router
/// 	.subscribe("rooms/+room/temperature", |message: Message| async move {
/// 		let room = message.params.single("room").unwrap_or_default();
/// 		println!("{room}: {:?}", message.payload_str());
/// 	})
/// 	.await?;
/// # Ok(())
/// # }
/// ```
pub struct Router<T: Transport> {
	client: MqttClient<T>,
	inner: Arc<RouterInner>,
	forwarder: JoinHandle<()>,
}

struct RouterInner {
	prefix: Option<ArcStr>,
	registry: Registry,
	events: broadcast::Sender<ClientEvent>,
}

impl<T: Transport> Router<T> {
	/// Attaches a new router at the end of the client's dispatch chain.
	///
	/// Must be called within a Tokio runtime; lifecycle events are forwarded
	/// by a spawned task that lives as long as the router.
	pub fn new(client: &MqttClient<T>, options: RouterOptions) -> Self {
		let prefix = options
			.prefix
			.map(|prefix| ArcStr::from(prefix.trim_end_matches(SEPARATOR)))
			.filter(|prefix| !prefix.is_empty());
		let (events, _) =
			broadcast::channel(client.settings().event_channel_capacity);
		let inner = Arc::new(RouterInner {
			prefix,
			registry: Registry::default(),
			events,
		});

		client.use_route(Arc::clone(&inner));
		let forwarder =
			tokio::spawn(forward_events(client.events(), Arc::clone(&inner)));

		Self {
			client: client.clone(),
			inner,
			forwarder,
		}
	}

	/// Registers `handler` for one or more patterns.
	///
	/// Patterns are prefixed and validated up front; the normalized filters
	/// go to the client and the bindings are stored only once that succeeds.
	pub async fn subscribe(
		&self,
		patterns: impl Into<Topics>,
		handler: impl Handler,
	) -> Result<Grant, ClientError> {
		self.subscribe_with_options(patterns, handler, SubscribeOptions::default())
			.await
	}

	pub async fn subscribe_with_options(
		&self,
		patterns: impl Into<Topics>,
		handler: impl Handler,
		options: SubscribeOptions,
	) -> Result<Grant, ClientError> {
		let patterns: Topics = patterns.into();
		patterns.validate()?;
		let prefixed = self.apply_prefix(patterns);
		let compiled = prefixed
			.iter()
			.map(|pattern| TopicPattern::parse(pattern.clone()))
			.collect::<Result<Vec<_>, _>>()?;

		let grant = self
			.client
			.subscribe_with_options(prefixed.normalized(), options)
			.await?;

		let handler: Arc<dyn Handler> = Arc::new(handler);
		self.inner.registry.insert(
			compiled
				.into_iter()
				.map(|pattern| Binding::new(pattern, Arc::clone(&handler))),
		);
		debug!(patterns = %prefixed, queued = grant.is_queued(), "Router bindings registered");
		Ok(grant)
	}

	/// Unsubscribes and drops the matching bindings.
	pub async fn unsubscribe(
		&self,
		patterns: impl Into<Topics>,
	) -> Result<(), ClientError> {
		let patterns: Topics = patterns.into();
		patterns.validate()?;
		let normalized = self.apply_prefix(patterns).normalized();

		self.client.unsubscribe(normalized.clone()).await?;
		let removed = self.inner.registry.remove(&normalized.to_vec());
		debug!(patterns = %normalized, removed, "Router bindings removed");
		Ok(())
	}

	/// Publishes below the router's prefix.
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
		let topic = self.inner.apply_prefix(&ArcStr::from(topic));
		self.client
			.publish_with_options(&topic, payload, options)
			.await
	}

	/// Prepends the prefix to every entry, keeping the shape.
	pub fn apply_prefix(&self, topics: impl Into<Topics>) -> Topics {
		let topics: Topics = topics.into();
		topics.map(|topic| self.inner.apply_prefix(topic))
	}

	pub fn prefix(&self) -> Option<&str> {
		self.inner.prefix.as_deref()
	}

	/// Registered patterns, prefixed and with capture names, in
	/// registration order.
	pub fn patterns(&self) -> Vec<ArcStr> {
		self.inner.registry.patterns()
	}

	/// Client lifecycle events forwarded by this router. Messages are not
	/// forwarded.
	pub fn events(&self) -> broadcast::Receiver<ClientEvent> {
		self.inner.events.subscribe()
	}

	/// Offers `message` to this router's bindings only.
	pub fn handle(&self, message: &Message) -> bool {
		self.inner.dispatch(message)
	}

	pub fn client(&self) -> &MqttClient<T> {
		&self.client
	}
}

impl<T: Transport> Drop for Router<T> {
	fn drop(&mut self) {
		self.forwarder.abort();
	}
}

impl RouterInner {
	fn apply_prefix(&self, topic: &ArcStr) -> ArcStr {
		match &self.prefix {
			| Some(prefix) => arcstr::format!("{prefix}{SEPARATOR}{topic}"),
			| None => topic.clone(),
		}
	}

	fn dispatch(&self, message: &Message) -> bool {
		let bindings = self.registry.snapshot();
		let Some((binding, params)) = bindings.iter().find_map(|binding| {
			binding
				.pattern
				.try_match(&message.topic)
				.map(|params| (binding, params))
		}) else {
			return false;
		};

		debug!(topic = %message.topic, pattern = %binding.pattern, "Dispatching message");
		let handler = Arc::clone(&binding.handler);
		let pattern = binding.pattern.pattern().clone();
		let message = message.clone().with_params(params);
		tokio::spawn(async move {
			let topic = message.topic.clone();
			let invocation = AssertUnwindSafe(async move {
				handler.call(message).await;
			});
			if let Err(panic) = invocation.catch_unwind().await {
				error!(
					topic = %topic,
					pattern = %pattern,
					panic = panic_message(panic.as_ref()),
					"Message handler panicked"
				);
			}
		});
		true
	}
}

impl Route for RouterInner {
	fn handle(&self, message: &Message) -> bool {
		self.dispatch(message)
	}
}

fn panic_message(panic: &(dyn Any + Send)) -> &str {
	panic
		.downcast_ref::<&str>()
		.copied()
		.or_else(|| panic.downcast_ref::<String>().map(String::as_str))
		.unwrap_or("non-string panic payload")
}

async fn forward_events(
	mut events: broadcast::Receiver<ClientEvent>,
	router: Arc<RouterInner>,
) {
	loop {
		match events.recv().await {
			| Ok(ClientEvent::Message(_)) => {}
			| Ok(event) => {
				let _ = router.events.send(event);
			}
			| Err(RecvError::Lagged(skipped)) => {
				warn!(skipped, "Router lagged behind client events");
			}
			| Err(RecvError::Closed) => break,
		}
	}
}
