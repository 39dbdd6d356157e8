//! Named wildcard captures extracted from a matched topic

use arcstr::Substr;
use smallvec::SmallVec;

/// Value captured by a named wildcard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capture {
	/// Level matched by `+name`
	Single(Substr),
	/// Remaining levels matched by `#name`, possibly none
	Multi(Vec<Substr>),
}

impl Capture {
	/// Returns the level for a single-level capture.
	pub fn as_single(&self) -> Option<&str> {
		match self {
			| Capture::Single(value) => Some(value.as_str()),
			| Capture::Multi(_) => None,
		}
	}

	/// Returns the levels for a multi-level capture.
	pub fn as_multi(&self) -> Option<&[Substr]> {
		match self {
			| Capture::Multi(values) => Some(values),
			| Capture::Single(_) => None,
		}
	}

	/// Captured levels joined back with `/`.
	pub fn joined(&self) -> String {
		match self {
			| Capture::Single(value) => value.to_string(),
			| Capture::Multi(values) => values
				.iter()
				.map(Substr::as_str)
				.collect::<Vec<_>>()
				.join("/"),
		}
	}
}

/// Captures of one matched message, in pattern order.
///
/// Inserting a name that is already present replaces its value in place.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CaptureMap {
	entries: SmallVec<[(Substr, Capture); 4]>,
}

impl CaptureMap {
	/// Creates an empty map.
	pub fn new() -> Self {
		Self::default()
	}

	/// Records a capture.
	pub fn insert(&mut self, name: Substr, capture: Capture) {
		match self.entries.iter_mut().find(|(n, _)| *n == name) {
			| Some((_, existing)) => *existing = capture,
			| None => self.entries.push((name, capture)),
		}
	}

	/// Looks up a capture by name.
	pub fn get(&self, name: &str) -> Option<&Capture> {
		self.entries
			.iter()
			.find(|(n, _)| n.as_str() == name)
			.map(|(_, capture)| capture)
	}

	/// Value of a `+name` capture.
	pub fn single(&self, name: &str) -> Option<&str> {
		self.get(name).and_then(Capture::as_single)
	}

	/// Levels of a `#name` capture.
	pub fn multi(&self, name: &str) -> Option<Vec<&str>> {
		self.get(name)
			.and_then(Capture::as_multi)
			.map(|values| values.iter().map(Substr::as_str).collect())
	}

	/// Number of captures.
	pub fn len(&self) -> usize {
		self.entries.len()
	}

	/// True when the pattern had no named wildcards.
	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}

	/// Iterates over `(name, capture)` pairs in pattern order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &Capture)> {
		self.entries
			.iter()
			.map(|(name, capture)| (name.as_str(), capture))
	}
}
