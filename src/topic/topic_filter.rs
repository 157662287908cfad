use std::fmt::{self, Display};
use std::str::FromStr;

use arcstr::ArcStr;
use smallvec::SmallVec;

use super::filter_segment::{FilterSegment, TopicFilterError};
use super::limits::MAX_TOPIC_LENGTH;

/// Parsed MQTT topic filter with wildcard support.
///
/// Cheap to clone: the original string is reference counted and every
/// literal segment is a slice of it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TopicFilter {
	filter: ArcStr,
	segments: SmallVec<[FilterSegment; 8]>,
}

impl TopicFilter {
	/// Parses and validates a topic filter.
	///
	/// `+` and `#` must occupy a whole level and `#` may only appear as the
	/// last level. Empty levels (`a//b`, `/a`) are allowed.
	pub fn new(filter: impl Into<ArcStr>) -> Result<Self, TopicFilterError> {
		let filter = filter.into();
		if filter.is_empty() {
			return Err(TopicFilterError::EmptyFilter);
		}
		if filter.len() > MAX_TOPIC_LENGTH {
			return Err(TopicFilterError::TooLong {
				length: filter.len(),
				limit: MAX_TOPIC_LENGTH,
			});
		}

		let segments = filter
			.split('/')
			.map(|s| filter.substr_from(s))
			.map(FilterSegment::try_from)
			.collect::<Result<SmallVec<[FilterSegment; 8]>, _>>()?;

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(s, FilterSegment::MultiLevel))
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicFilterError::hash_position(filter.as_str()));
			}
		}

		Ok(Self { filter, segments })
	}

	/// Original filter string.
	pub fn as_str(&self) -> &str {
		&self.filter
	}

	/// Parsed levels of the filter.
	pub fn segments(&self) -> &[FilterSegment] {
		&self.segments
	}

	/// Returns true if the filter contains `+` or `#`.
	pub fn has_wildcards(&self) -> bool {
		self.segments.iter().any(FilterSegment::is_wildcard)
	}

	/// Checks a concrete topic against this filter without a tree.
	///
	/// `a/#` matches `a`, `a/b` and `a/b/c`; `a/+/c` matches `a/x/c` but not
	/// `a/x/y/c`.
	pub fn matches(&self, topic: &str) -> bool {
		let mut levels = topic.split('/');
		for segment in &self.segments {
			match segment {
				| FilterSegment::MultiLevel => return true,
				| FilterSegment::SingleLevel => {
					if levels.next().is_none() {
						return false;
					}
				}
				| FilterSegment::Literal(expected) => {
					if levels.next() != Some(expected.as_str()) {
						return false;
					}
				}
			}
		}
		levels.next().is_none()
	}
}

impl Display for TopicFilter {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.filter)
	}
}

impl AsRef<str> for TopicFilter {
	fn as_ref(&self) -> &str {
		&self.filter
	}
}

impl FromStr for TopicFilter {
	type Err = TopicFilterError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl TryFrom<&str> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<String> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<ArcStr> for TopicFilter {
	type Error = TopicFilterError;

	fn try_from(value: ArcStr) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
