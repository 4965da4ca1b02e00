//! Topic handling module
//!
//! This module provides components for working with MQTT topic patterns,
//! including parsing, matching, parameter extraction and the
//! component-scoped topic conventions.

// Submodules
pub mod error;
pub mod namespace;
pub mod topic_match;
pub mod topic_pattern_item;
/// Topic pattern parsing and matching
pub mod topic_pattern_path;


// Re-export commonly used types for convenience
pub use error::TopicError;
// Re-export constants and validation utilities
pub use error::{limits, validation};
pub use namespace::{
	COMPONENT_ID_PLACEHOLDER, settings_property, settings_topic,
	substitute_component_id,
};
pub use topic_match::{TopicMatch, TopicMatchError, TopicParams, TopicPath};
pub use topic_pattern_item::{TopicPatternError, TopicPatternItem};
pub use topic_pattern_path::TopicPatternPath;
