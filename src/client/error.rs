use rumqttc::OptionError;
use thiserror::Error;

use crate::connection::AdapterError;
use crate::routing::{RouteError, RouteId};
use crate::topic::{TopicError, TopicPatternError};

/// Errors returned by component operations
#[derive(Debug, Error)]
pub enum ComponentError {
	/// Route topic failed to compile
	#[error("Invalid topic pattern: {0}")]
	InvalidPattern(#[from] TopicPatternError),

	/// A route for the same topic is already declared
	#[error("Route for topic '{topic}' is already declared")]
	DuplicateRoute {
		/// Topic after placeholder substitution
		topic: String,
	},

	/// No route with this id
	#[error("{0} not found")]
	RouteNotFound(RouteId),

	/// Operation requires a live broker connection
	#[error("Not connected to broker")]
	NotConnected,

	/// `start` called while a connection is active or being established
	#[error("Component already started")]
	AlreadyStarted,

	/// Connection closed before it was established
	#[error("Connection closed before the component started")]
	ConnectionClosed,

	/// `set_local` asked to propagate while disconnected
	#[error("Cannot propagate setting '{property}' while disconnected")]
	PropagationWithoutConnection {
		/// Setting that was stored locally only
		property: String,
	},

	/// Payload could not be serialized
	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	/// Broker connection failure
	#[error("Connection error: {0}")]
	Adapter(#[from] AdapterError),

	/// Invalid connection options
	#[error("Configuration error: {0}")]
	Configuration(#[from] OptionError),

	/// Invalid configuration parameter values
	#[error("Invalid configuration value: {0}")]
	ConfigurationValue(String),

	/// Concrete topic rejected before transmission
	#[error("Invalid topic: {0}")]
	InvalidTopic(#[from] TopicError),

	/// Declared settings did not arrive in time
	#[error("Settings were not received before the readiness timeout")]
	ReadinessTimedOut,

	/// The dispatcher task is gone
	#[error("Dispatcher task has stopped")]
	DispatcherStopped,
}

impl ComponentError {
	/// Creates a new PropagationWithoutConnection error
	pub fn propagation_without_connection(property: impl Into<String>) -> Self {
		Self::PropagationWithoutConnection {
			property: property.into(),
		}
	}
}

impl From<RouteError> for ComponentError {
	fn from(err: RouteError) -> Self {
		match err {
			| RouteError::Duplicate { topic } => {
				ComponentError::DuplicateRoute { topic }
			}
			| RouteError::InvalidPattern(e) => ComponentError::InvalidPattern(e),
			| RouteError::NotFound { id } => ComponentError::RouteNotFound(id),
		}
	}
}
