//! Error types and limits for the topic module

use thiserror::Error;

/// Errors produced while compiling patterns or validating concrete topics.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PatternError {
	/// Pattern (or one entry of a pattern list) is empty
	#[error("Topic pattern cannot be empty")]
	EmptyPattern,

	/// Multi-level wildcard used before the final segment
	#[error(
		"Invalid topic pattern '{pattern}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition {
		/// The rejected pattern
		pattern: String,
	},

	/// `+` or `#` found somewhere other than the first character of a segment
	#[error("Invalid wildcard usage in segment '{segment}'")]
	WildcardUsage {
		/// The offending segment
		segment: String,
	},

	/// The same capture name appears twice in one pattern
	#[error("Capture name '{name}' is used more than once")]
	DuplicateCapture {
		/// Repeated capture name
		name: String,
	},

	/// Rendering a pattern needs a capture that is unnamed or absent
	#[error("No value for wildcard '{name}'")]
	MissingCapture {
		/// Capture name, or the bare wildcard for unnamed segments
		name: String,
	},

	/// Concrete topic is not usable for publishing
	#[error("Topic '{topic}' is invalid: {reason}")]
	InvalidTopic {
		/// The rejected topic
		topic: String,
		/// Why it was rejected
		reason: &'static str,
	},
}

impl PatternError {
	/// Creates a new HashPosition error
	pub fn hash_position(pattern: impl Into<String>) -> Self {
		Self::HashPosition {
			pattern: pattern.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(segment: impl Into<String>) -> Self {
		Self::WildcardUsage {
			segment: segment.into(),
		}
	}

	/// Creates a new InvalidTopic error
	pub fn invalid_topic(topic: impl Into<String>, reason: &'static str) -> Self {
		Self::InvalidTopic {
			topic: topic.into(),
			reason,
		}
	}
}

/// Convenient Result type for pattern operations
pub type PatternResult<T> = Result<T, PatternError>;

/// Topic processing limits
pub mod limits {
	/// Maximum length of a topic in bytes, as allowed by the MQTT wire format
	pub const MAX_TOPIC_LENGTH: usize = 65_535;
}

/// Validates a concrete topic before it is handed to the transport.
pub fn validate_publish_topic(topic: &str) -> PatternResult<()> {
	if topic.is_empty() {
		return Err(PatternError::invalid_topic(topic, "topic is empty"));
	}
	if topic.len() > limits::MAX_TOPIC_LENGTH {
		let head: String = topic.chars().take(64).collect();
		return Err(PatternError::invalid_topic(head, "topic is too long"));
	}
	if topic.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
		return Err(PatternError::invalid_topic(
			topic,
			"topic contains illegal characters ('#', '+', or null byte)",
		));
	}
	Ok(())
}
