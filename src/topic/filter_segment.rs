//! Topic filter segment types

use std::convert::TryFrom;

use arcstr::Substr;
use thiserror::Error;

/// Error types for topic filter parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicFilterError {
	/// Empty filter is not valid
	#[error("Topic filter cannot be empty")]
	EmptyFilter,

	/// A request carried no filters at all
	#[error("At least one topic filter is required")]
	NoFilters,

	/// Multi-level wildcard (#) used anywhere but the last segment
	#[error(
		"Invalid topic filter '{filter}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition {
		/// The invalid filter
		filter: String,
	},

	/// Wildcard characters mixed with other characters inside a segment
	#[error("Invalid wildcard usage in segment '{segment}'")]
	WildcardUsage {
		/// The offending segment
		segment: String,
	},

	/// Filter contains a null character
	#[error("Topic filter cannot contain a null character")]
	NullCharacter,

	/// Filter exceeds the MQTT length limit
	#[error("Topic filter is {length} bytes long, limit is {limit}")]
	TooLong {
		/// Actual length in bytes
		length: usize,
		/// Maximum allowed length
		limit: usize,
	},
}

impl TopicFilterError {
	/// Creates a new HashPosition error
	pub fn hash_position(filter: impl Into<String>) -> Self {
		Self::HashPosition {
			filter: filter.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(segment: impl Into<String>) -> Self {
		Self::WildcardUsage {
			segment: segment.into(),
		}
	}
}

/// One level of a topic filter: a literal or a wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FilterSegment {
	/// Literal level, possibly empty (`a//b`)
	Literal(Substr),
	/// Single-level wildcard `+`
	SingleLevel,
	/// Multi-level wildcard `#`
	MultiLevel,
}

impl FilterSegment {
	/// Returns the string form of the segment.
	pub fn as_str(&self) -> &str {
		match self {
			| FilterSegment::Literal(s) => s,
			| FilterSegment::SingleLevel => "+",
			| FilterSegment::MultiLevel => "#",
		}
	}

	/// Returns true if this segment is `+` or `#`.
	pub fn is_wildcard(&self) -> bool {
		!matches!(self, FilterSegment::Literal(_))
	}
}

impl std::fmt::Display for FilterSegment {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.write_str(self.as_str())
	}
}

impl TryFrom<Substr> for FilterSegment {
	type Error = TopicFilterError;

	fn try_from(segment: Substr) -> Result<Self, Self::Error> {
		let res = match segment.as_str() {
			| "+" => FilterSegment::SingleLevel,
			| "#" => FilterSegment::MultiLevel,
			| s if s.contains(['+', '#']) => {
				return Err(TopicFilterError::wildcard_usage(s));
			}
			| s if s.contains('\0') => {
				return Err(TopicFilterError::NullCharacter);
			}
			| _ => FilterSegment::Literal(segment),
		};
		Ok(res)
	}
}
