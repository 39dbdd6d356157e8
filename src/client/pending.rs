//! Operations accepted while no session is connected

use arcstr::ArcStr;
use bytes::Bytes;

use crate::transport::{PublishOptions, SubscribeOptions};

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingPublish {
	pub topic: ArcStr,
	pub payload: Bytes,
	pub options: PublishOptions,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingSubscribe {
	pub filters: Vec<ArcStr>,
	pub options: SubscribeOptions,
}

/// Number of queued operations per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PendingSummary {
	pub publishes: usize,
	pub subscriptions: usize,
}

/// Two stacks drained newest first.
#[derive(Debug, Default)]
pub(crate) struct PendingQueue {
	publishes: Vec<PendingPublish>,
	subscriptions: Vec<PendingSubscribe>,
}

impl PendingQueue {
	pub fn push_publish(&mut self, publish: PendingPublish) {
		self.publishes.push(publish);
	}

	pub fn push_subscribe(&mut self, subscribe: PendingSubscribe) {
		self.subscriptions.push(subscribe);
	}

	pub fn summary(&self) -> PendingSummary {
		PendingSummary {
			publishes: self.publishes.len(),
			subscriptions: self.subscriptions.len(),
		}
	}

	pub fn is_empty(&self) -> bool {
		self.publishes.is_empty() && self.subscriptions.is_empty()
	}

	/// Takes everything for replay, newest entries first.
	pub fn drain_lifo(&mut self) -> (Vec<PendingSubscribe>, Vec<PendingPublish>) {
		let mut subscriptions = std::mem::take(&mut self.subscriptions);
		let mut publishes = std::mem::take(&mut self.publishes);
		subscriptions.reverse();
		publishes.reverse();
		(subscriptions, publishes)
	}
}
