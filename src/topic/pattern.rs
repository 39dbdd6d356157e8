//! Wildcard pattern normalization, matching and capture extraction
//!
//! The free functions implement the reference grammar on plain strings and
//! never fail. [`TopicPattern`] is the compiled, validated form the router
//! keeps in its registry.

use std::collections::HashSet;
use std::convert::TryFrom;
use std::fmt;
use std::str::FromStr;

use arcstr::{ArcStr, Substr};
use smallvec::SmallVec;

use super::capture::{Capture, CaptureMap};
use super::error::{PatternError, PatternResult};
use super::segment::{MULTI_LEVEL, PatternSegment, SEPARATOR, SINGLE_LEVEL};

type Segments<'a> = SmallVec<[&'a str; 8]>;

/// Strips capture names, leaving the bare wildcards the broker understands.
///
/// `normalize("a/+name/#tail") == "a/+/#"`
pub fn normalize(pattern: &str) -> String {
	let mut normalized = String::with_capacity(pattern.len());
	for (i, segment) in pattern.split(SEPARATOR).enumerate() {
		if i > 0 {
			normalized.push(SEPARATOR);
		}
		match segment.chars().next() {
			| Some(wildcard @ (SINGLE_LEVEL | MULTI_LEVEL)) => {
				normalized.push(wildcard)
			}
			| _ => normalized.push_str(segment),
		}
	}
	normalized
}

/// Sequence form of [`normalize`]; order and length are preserved.
pub fn normalize_all<S: AsRef<str>>(patterns: &[S]) -> Vec<String> {
	patterns.iter().map(|p| normalize(p.as_ref())).collect()
}

/// Tests a concrete topic against a pattern.
///
/// `#` matches the remaining levels (zero or more) but only when it is the
/// last pattern segment; a `#` anywhere else makes the match fail instead of
/// raising an error. `+` never matches an empty level.
pub fn matches(pattern: &str, topic: &str) -> bool {
	let pattern_segments: Segments = pattern.split(SEPARATOR).collect();
	let topic_segments: Segments = topic.split(SEPARATOR).collect();
	let last_index = pattern_segments.len() - 1;

	for (i, segment) in pattern_segments.iter().enumerate() {
		let leading = segment.chars().next();
		if leading == Some(MULTI_LEVEL) {
			return i == last_index;
		}
		let current = match topic_segments.get(i) {
			| Some(current) if !current.is_empty() => *current,
			| _ => return false,
		};
		if leading != Some(SINGLE_LEVEL) && *segment != current {
			return false;
		}
	}

	pattern_segments.len() == topic_segments.len()
}

/// Pulls named captures out of a topic that [`matches`] the pattern.
///
/// Bare wildcards produce nothing. The result for a non-matching pair is
/// unspecified.
pub fn extract(pattern: &str, topic: &str) -> CaptureMap {
	let pattern = ArcStr::from(pattern);
	let topic = ArcStr::from(topic);
	let topic_segments = split_topic(&topic);

	let mut captures = CaptureMap::new();
	for (i, segment) in pattern.split(SEPARATOR).enumerate() {
		match PatternSegment::classify(pattern.substr_from(segment)) {
			| PatternSegment::Multi(Some(name)) => {
				captures.insert(name, Capture::Multi(tail(&topic_segments, i)));
				break;
			}
			| PatternSegment::Single(Some(name)) => {
				if let Some(value) = topic_segments.get(i) {
					captures.insert(name, Capture::Single(value.clone()));
				}
			}
			| _ => {}
		}
	}
	captures
}

fn split_topic(topic: &ArcStr) -> Vec<Substr> {
	topic.split(SEPARATOR).map(|s| topic.substr_from(s)).collect()
}

fn tail(segments: &[Substr], from: usize) -> Vec<Substr> {
	segments.get(from ..).map(<[Substr]>::to_vec).unwrap_or_default()
}

/// Compiled topic pattern.
///
/// Keeps the pattern as written (capture names included) for matching and
/// extraction, plus the normalized filter used for broker subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicPattern {
	pattern: ArcStr,
	normalized: ArcStr,
	segments: SmallVec<[PatternSegment; 8]>,
}

impl TopicPattern {
	/// Compiles and validates a pattern.
	///
	/// Rejects empty patterns, `#` before the last segment, wildcard
	/// characters after the first character of a segment and repeated
	/// capture names.
	pub fn parse(pattern: impl Into<ArcStr>) -> PatternResult<Self> {
		let pattern = pattern.into();
		if pattern.is_empty() {
			return Err(PatternError::EmptyPattern);
		}

		let segments = pattern
			.split(SEPARATOR)
			.map(|s| PatternSegment::try_from(pattern.substr_from(s)))
			.collect::<PatternResult<SmallVec<[PatternSegment; 8]>>>()?;

		let mut seen_names = HashSet::new();
		for name in segments.iter().filter_map(PatternSegment::capture_name) {
			if !seen_names.insert(name.as_str()) {
				return Err(PatternError::DuplicateCapture {
					name: name.to_string(),
				});
			}
		}

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(s, PatternSegment::Multi(_)))
		{
			if hash_pos != segments.len() - 1 {
				return Err(PatternError::hash_position(pattern.as_str()));
			}
		}

		Ok(Self {
			normalized: ArcStr::from(normalize(&pattern)),
			pattern,
			segments,
		})
	}

	/// Pattern as written, capture names included.
	pub fn as_str(&self) -> &str {
		&self.pattern
	}

	/// Shared handle to the pattern as written.
	pub fn pattern(&self) -> &ArcStr {
		&self.pattern
	}

	/// Broker-facing filter with bare wildcards.
	pub fn normalized(&self) -> &ArcStr {
		&self.normalized
	}

	/// Compiled segments.
	pub fn segments(&self) -> &[PatternSegment] {
		&self.segments
	}

	/// Number of segments.
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	/// Always false for a compiled pattern; present for API symmetry.
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}

	/// True when the pattern ends in `#`.
	pub fn has_multi_level(&self) -> bool {
		self.segments
			.last()
			.is_some_and(|s| matches!(s, PatternSegment::Multi(_)))
	}

	/// Capture names in pattern order.
	pub fn capture_names(&self) -> impl Iterator<Item = &str> {
		self.segments
			.iter()
			.filter_map(PatternSegment::capture_name)
			.map(Substr::as_str)
	}

	/// Same answer as [`matches`] on the written pattern.
	pub fn matches(&self, topic: &str) -> bool {
		let topic_segments: Segments = topic.split(SEPARATOR).collect();
		let last_index = self.segments.len() - 1;

		for (i, segment) in self.segments.iter().enumerate() {
			let current = topic_segments.get(i).filter(|s| !s.is_empty());
			match (segment, current) {
				| (PatternSegment::Multi(_), _) => return i == last_index,
				| (_, None) => return false,
				| (PatternSegment::Single(_), Some(_)) => {}
				| (PatternSegment::Literal(literal), Some(current)) => {
					if literal.as_str() != *current {
						return false;
					}
				}
			}
		}

		self.segments.len() == topic_segments.len()
	}

	/// Captures from a topic already known to match.
	///
	/// Values are slices of `topic`, no copies of the text are made.
	pub fn extract(&self, topic: &ArcStr) -> CaptureMap {
		let topic_segments = split_topic(topic);
		let mut captures = CaptureMap::new();
		for (i, segment) in self.segments.iter().enumerate() {
			match segment {
				| PatternSegment::Multi(Some(name)) => {
					let rest = tail(&topic_segments, i);
					captures.insert(name.clone(), Capture::Multi(rest));
					break;
				}
				| PatternSegment::Single(Some(name)) => {
					if let Some(value) = topic_segments.get(i) {
						captures.insert(name.clone(), Capture::Single(value.clone()));
					}
				}
				| _ => {}
			}
		}
		captures
	}

	/// Matches and extracts in one step.
	pub fn try_match(&self, topic: &ArcStr) -> Option<CaptureMap> {
		self.matches(topic).then(|| self.extract(topic))
	}

	/// Builds a concrete topic by substituting captures into the wildcards.
	///
	/// Every wildcard must be named and present in `captures`. An empty
	/// multi-level capture drops the trailing level entirely.
	pub fn render(&self, captures: &CaptureMap) -> PatternResult<String> {
		let mut topic = String::with_capacity(self.pattern.len());
		for (i, segment) in self.segments.iter().enumerate() {
			let value = match segment {
				| PatternSegment::Literal(literal) => literal.to_string(),
				| PatternSegment::Single(name) | PatternSegment::Multi(name) => {
					let capture = name
						.as_ref()
						.and_then(|name| captures.get(name))
						.ok_or_else(|| PatternError::MissingCapture {
							name: segment.as_written().into_owned(),
						})?;
					if matches!(capture, Capture::Multi(values) if values.is_empty())
					{
						break;
					}
					capture.joined()
				}
			};
			if i > 0 {
				topic.push(SEPARATOR);
			}
			topic.push_str(&value);
		}
		Ok(topic)
	}
}

impl fmt::Display for TopicPattern {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.pattern)
	}
}

impl FromStr for TopicPattern {
	type Err = PatternError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s)
	}
}

impl TryFrom<&str> for TopicPattern {
	type Error = PatternError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

impl TryFrom<String> for TopicPattern {
	type Error = PatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}

impl TryFrom<ArcStr> for TopicPattern {
	type Error = PatternError;

	fn try_from(value: ArcStr) -> Result<Self, Self::Error> {
		Self::parse(value)
	}
}
