//! Ordered binding registry with copy-on-write snapshots

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcstr::ArcStr;

use super::handler::Handler;
use crate::topic::TopicPattern;

/// Pattern registered by a router together with its handler.
#[derive(Clone)]
pub(crate) struct Binding {
	/// Prefixed, normalized pattern; identity of the binding
	pub key: ArcStr,
	/// Prefixed pattern as written, used for matching and captures
	pub pattern: TopicPattern,
	pub handler: Arc<dyn Handler>,
}

impl Binding {
	pub fn new(pattern: TopicPattern, handler: Arc<dyn Handler>) -> Self {
		Self {
			key: pattern.normalized().clone(),
			pattern,
			handler,
		}
	}
}

/// Writers clone the list, readers keep walking the snapshot they took.
#[derive(Default)]
pub(crate) struct Registry {
	bindings: Mutex<Arc<Vec<Binding>>>,
}

impl Registry {
	fn lock(&self) -> MutexGuard<'_, Arc<Vec<Binding>>> {
		self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn snapshot(&self) -> Arc<Vec<Binding>> {
		Arc::clone(&self.lock())
	}

	/// Appends bindings; one with an existing key takes over its slot.
	pub fn insert(&self, new_bindings: impl IntoIterator<Item = Binding>) {
		let mut guard = self.lock();
		let bindings = Arc::make_mut(&mut guard);
		for binding in new_bindings {
			match bindings.iter_mut().find(|b| b.key == binding.key) {
				| Some(slot) => *slot = binding,
				| None => bindings.push(binding),
			}
		}
	}

	/// Removes the bindings stored under `keys`, returning how many went.
	pub fn remove(&self, keys: &[ArcStr]) -> usize {
		let mut guard = self.lock();
		let bindings = Arc::make_mut(&mut guard);
		let before = bindings.len();
		bindings.retain(|binding| !keys.contains(&binding.key));
		before - bindings.len()
	}

	/// Registered patterns as written, in registration order.
	pub fn patterns(&self) -> Vec<ArcStr> {
		self.snapshot()
			.iter()
			.map(|binding| binding.pattern.pattern().clone())
			.collect()
	}
}
