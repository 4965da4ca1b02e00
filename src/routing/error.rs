use thiserror::Error;

use super::route::RouteId;
use crate::topic::TopicPatternError;

/// Errors raised by route table operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RouteError {
	/// A route with the same topic template already exists
	#[error("Route for topic '{topic}' is already declared")]
	Duplicate {
		/// Normalized topic template
		topic: String,
	},
	/// Topic template failed to compile
	#[error("Invalid route pattern: {0}")]
	InvalidPattern(#[from] TopicPatternError),
	/// No route with this id exists
	#[error("{id} not found")]
	NotFound {
		/// Missing route
		id: RouteId,
	},
}

impl RouteError {
	/// Creates a new Duplicate error
	pub fn duplicate(topic: impl Into<String>) -> Self {
		Self::Duplicate {
			topic: topic.into(),
		}
	}
}
