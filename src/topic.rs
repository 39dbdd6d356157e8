//! Topic handling module
//!
//! Pattern normalization, wildcard matching and named capture extraction.
//! Patterns follow the MQTT filter grammar, with an optional capture name
//! after a wildcard character: `sensors/+id/#rest`.

pub mod capture;
pub mod error;
/// Pattern algorithms and the compiled pattern type
pub mod pattern;
pub mod segment;
pub mod topics;

#[cfg(test)]
mod pattern_tests;

pub use capture::{Capture, CaptureMap};
pub use error::{PatternError, PatternResult, limits, validate_publish_topic};
pub use pattern::{TopicPattern, extract, matches, normalize, normalize_all};
pub use segment::{MULTI_LEVEL, PatternSegment, SEPARATOR, SINGLE_LEVEL};
pub use topics::Topics;
