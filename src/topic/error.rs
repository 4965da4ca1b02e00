//! Error types and utilities for the topic module
//!
//! This module contains the composite error type and shared constants
//! for the entire topic module, while individual error types remain
//! in their respective modules.

use thiserror::Error;

use super::topic_match::TopicMatchError;
use super::topic_pattern_item::TopicPatternError;

/// Comprehensive error type for all topic-related operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicError {
	/// Topic pattern parsing or validation error
	#[error("Topic pattern error: {0}")]
	Pattern(#[from] TopicPatternError),

	/// Topic did not match a pattern
	#[error("Topic match error: {0}")]
	Match(#[from] TopicMatchError),

	/// Concrete topic is not valid for publishing or subscribing
	#[error("Invalid topic '{topic}': {reason}")]
	InvalidTopic {
		/// Offending topic
		topic: String,
		/// Why it was rejected
		reason: String,
	},
}

impl TopicError {
	/// Creates a new InvalidTopic error
	pub fn invalid_topic(
		topic: impl Into<String>,
		reason: impl Into<String>,
	) -> Self {
		Self::InvalidTopic {
			topic: topic.into(),
			reason: reason.into(),
		}
	}
}

/// Topic processing limits and constants
pub mod limits {
	/// Maximum length in bytes of an MQTT topic
	pub const MAX_TOPIC_LENGTH: usize = 65535;
}

/// Validation utilities for topic operations
pub mod validation {
	use super::limits::*;
	use super::TopicError;

	/// Validates a concrete topic used for publishing.
	pub fn validate_publish_topic(topic: &str) -> Result<(), TopicError> {
		if topic.is_empty() || topic.len() > MAX_TOPIC_LENGTH {
			return Err(TopicError::invalid_topic(
				topic,
				"Topic is empty or too long",
			));
		}
		if topic.chars().any(|c| matches!(c, '\0' | '#' | '+')) {
			return Err(TopicError::invalid_topic(
				topic,
				"Topic contains illegal characters ('#', '+', or null byte)",
			));
		}
		Ok(())
	}

	/// Validates a subscription filter.
	pub fn validate_filter(filter: &str) -> Result<(), TopicError> {
		if filter.is_empty() || filter.len() > MAX_TOPIC_LENGTH {
			return Err(TopicError::invalid_topic(
				filter,
				"Filter is empty or too long",
			));
		}
		if filter.contains('\0') {
			return Err(TopicError::invalid_topic(
				filter,
				"Filter contains a null byte",
			));
		}
		Ok(())
	}
}
