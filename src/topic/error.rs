//! Error types and utilities for the topic module
//!
//! This module contains the composite error type and shared limits for the
//! topic module, while filter and tree errors stay in their own modules.

use thiserror::Error;

use super::filter_segment::TopicFilterError;

/// Errors for concrete topic names used when publishing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicNameError {
	/// Topic name is empty
	#[error("Topic name cannot be empty")]
	Empty,

	/// Topic name exceeds the MQTT length limit
	#[error("Topic name is {length} bytes long, limit is {limit}")]
	TooLong {
		/// Actual length in bytes
		length: usize,
		/// Maximum allowed length
		limit: usize,
	},

	/// Topic name contains a wildcard or a null character
	#[error("Topic '{topic}' contains illegal characters ('#', '+', or null byte)")]
	IllegalCharacter {
		/// The rejected topic
		topic: String,
	},
}

/// Comprehensive error type for all topic-related operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Topic filter parsing or validation error
	#[error("Topic filter error: {0}")]
	Filter(#[from] TopicFilterError),

	/// Topic name validation error
	#[error("Topic name error: {0}")]
	Name(#[from] TopicNameError),
}

/// Topic processing limits and constants
pub mod limits {
	/// Maximum length of a topic name or filter in bytes (MQTT 3.1.1 §1.5.3)
	pub const MAX_TOPIC_LENGTH: usize = 65_535;
}

/// Validation utilities for topic operations
pub mod validation {
	use super::TopicNameError;
	use super::limits::MAX_TOPIC_LENGTH;

	/// Validates a concrete topic name for publishing.
	///
	/// The name must be non-empty, at most [`MAX_TOPIC_LENGTH`] bytes and must
	/// not contain `+`, `#` or a null byte.
	pub fn validate_topic_name(topic: &str) -> Result<(), TopicNameError> {
		if topic.is_empty() {
			return Err(TopicNameError::Empty);
		}
		if topic.len() > MAX_TOPIC_LENGTH {
			return Err(TopicNameError::TooLong {
				length: topic.len(),
				limit: MAX_TOPIC_LENGTH,
			});
		}
		if topic.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
			return Err(TopicNameError::IllegalCharacter {
				topic: topic.to_string(),
			});
		}
		Ok(())
	}

}
