//! Pattern segment classification

use std::borrow::Cow;
use std::convert::TryFrom;

use arcstr::Substr;

use super::error::PatternError;

/// Separator between topic levels
pub const SEPARATOR: char = '/';
/// Single-level wildcard character
pub const SINGLE_LEVEL: char = '+';
/// Multi-level wildcard character
pub const MULTI_LEVEL: char = '#';

/// One `/`-delimited level of a pattern.
///
/// The wildcard variants carry the optional capture name written after the
/// wildcard character (`+id`, `#rest`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PatternSegment {
	/// Matches the identical topic level
	Literal(Substr),
	/// `+` or `+name`: exactly one non-empty level
	Single(Option<Substr>),
	/// `#` or `#name`: this level and everything after it
	Multi(Option<Substr>),
}

impl PatternSegment {
	/// Classifies a raw segment by its first character.
	///
	/// Never fails; anything not led by a wildcard character is a literal.
	pub fn classify(segment: Substr) -> Self {
		let mut chars = segment.chars();
		let leading = chars.next();
		let name = chars.as_str();
		let name = (!name.is_empty()).then(|| segment.substr_from(name));
		match leading {
			| Some(SINGLE_LEVEL) => PatternSegment::Single(name),
			| Some(MULTI_LEVEL) => PatternSegment::Multi(name),
			| _ => PatternSegment::Literal(segment),
		}
	}

	/// Returns the segment as the transport sees it: bare `+`/`#` or the literal.
	pub fn as_str(&self) -> &str {
		match self {
			| PatternSegment::Literal(s) => s,
			| PatternSegment::Single(_) => "+",
			| PatternSegment::Multi(_) => "#",
		}
	}

	/// Returns the segment as written, capture name included.
	pub fn as_written(&self) -> Cow<'_, str> {
		match self {
			| PatternSegment::Single(Some(name)) => {
				Cow::Owned(format!("{SINGLE_LEVEL}{name}"))
			}
			| PatternSegment::Multi(Some(name)) => {
				Cow::Owned(format!("{MULTI_LEVEL}{name}"))
			}
			| other => Cow::Borrowed(other.as_str()),
		}
	}

	/// Returns the capture name for named wildcards.
	pub fn capture_name(&self) -> Option<&Substr> {
		match self {
			| PatternSegment::Single(Some(name))
			| PatternSegment::Multi(Some(name)) => Some(name),
			| _ => None,
		}
	}

	/// Returns true for `+` and `#` segments, named or not.
	pub fn is_wildcard(&self) -> bool {
		matches!(self, PatternSegment::Single(_) | PatternSegment::Multi(_))
	}
}

impl std::fmt::Display for PatternSegment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(&self.as_written())
	}
}

/// Strict conversion used when compiling patterns for registration.
impl TryFrom<Substr> for PatternSegment {
	type Error = PatternError;

	fn try_from(segment: Substr) -> Result<Self, Self::Error> {
		let classified = PatternSegment::classify(segment.clone());
		let rest = match &classified {
			| PatternSegment::Literal(literal) => literal.as_str(),
			| PatternSegment::Single(name) | PatternSegment::Multi(name) => {
				name.as_ref().map_or("", |name| name.as_str())
			}
		};
		if rest.contains([SINGLE_LEVEL, MULTI_LEVEL]) {
			return Err(PatternError::wildcard_usage(segment.as_str()));
		}
		Ok(classified)
	}
}
