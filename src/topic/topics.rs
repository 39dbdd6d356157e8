//! "One topic or several" argument shape

use arcstr::ArcStr;

use super::error::{PatternError, PatternResult};
use super::pattern::normalize;

/// A single topic/pattern or an ordered list of them.
///
/// Operations that transform topics keep the shape: a `One` stays a `One`,
/// a `Many` keeps its length and order.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topics {
	/// Single topic or pattern
	One(ArcStr),
	/// Several topics or patterns
	Many(Vec<ArcStr>),
}

impl Topics {
	/// Iterates over the entries.
	pub fn iter(&self) -> std::slice::Iter<'_, ArcStr> {
		match self {
			| Topics::One(topic) => std::slice::from_ref(topic).iter(),
			| Topics::Many(topics) => topics.iter(),
		}
	}

	/// Number of entries.
	pub fn len(&self) -> usize {
		match self {
			| Topics::One(_) => 1,
			| Topics::Many(topics) => topics.len(),
		}
	}

	/// True for an empty list.
	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	/// Applies `f` to every entry, keeping the shape.
	pub fn map(&self, mut f: impl FnMut(&ArcStr) -> ArcStr) -> Topics {
		match self {
			| Topics::One(topic) => Topics::One(f(topic)),
			| Topics::Many(topics) => Topics::Many(topics.iter().map(f).collect()),
		}
	}

	/// Normalizes every entry, keeping the shape.
	pub fn normalized(&self) -> Topics {
		self.map(|pattern| ArcStr::from(normalize(pattern)))
	}

	/// Rejects an empty list and empty entries.
	pub fn validate(&self) -> PatternResult<()> {
		if self.is_empty() || self.iter().any(|topic| topic.is_empty()) {
			return Err(PatternError::EmptyPattern);
		}
		Ok(())
	}

	/// Entries as a vector.
	pub fn to_vec(&self) -> Vec<ArcStr> {
		self.iter().cloned().collect()
	}
}

impl<'a> IntoIterator for &'a Topics {
	type IntoIter = std::slice::Iter<'a, ArcStr>;
	type Item = &'a ArcStr;

	fn into_iter(self) -> Self::IntoIter {
		self.iter()
	}
}

impl From<&str> for Topics {
	fn from(value: &str) -> Self {
		Topics::One(ArcStr::from(value))
	}
}

impl From<&String> for Topics {
	fn from(value: &String) -> Self {
		Topics::One(ArcStr::from(value.as_str()))
	}
}

impl From<String> for Topics {
	fn from(value: String) -> Self {
		Topics::One(ArcStr::from(value))
	}
}

impl From<ArcStr> for Topics {
	fn from(value: ArcStr) -> Self {
		Topics::One(value)
	}
}

impl<T: Into<ArcStr>> From<Vec<T>> for Topics {
	fn from(values: Vec<T>) -> Self {
		Topics::Many(values.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<ArcStr>, const N: usize> From<[T; N]> for Topics {
	fn from(values: [T; N]) -> Self {
		Topics::Many(values.into_iter().map(Into::into).collect())
	}
}

impl<T: Into<ArcStr> + Clone> From<&[T]> for Topics {
	fn from(values: &[T]) -> Self {
		Topics::Many(values.iter().cloned().map(Into::into).collect())
	}
}

impl std::fmt::Display for Topics {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			| Topics::One(topic) => f.write_str(topic),
			| Topics::Many(topics) => {
				f.write_str("[")?;
				for (i, topic) in topics.iter().enumerate() {
					if i > 0 {
						f.write_str(", ")?;
					}
					f.write_str(topic)?;
				}
				f.write_str("]")
			}
		}
	}
}
