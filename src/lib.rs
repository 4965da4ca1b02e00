//! # MQTT Component
//!
//! A framework for broker-connected components: declarative topic routing
//! of inbound messages to handlers, and a settings bootstrap that holds a
//! component back until its settings have arrived from the broker.
//!
//! ## Features
//!
//! - **Pattern-based Routing**: MQTT wildcards (`+`, `#`) and named
//!   parameters (`{id}`, `{path:#}`, `+id`, `#path`) with first-match
//!   dispatch in declaration order
//! - **Subscription Management**: route filters are subscribed on connect and
//!   re-issued when the broker did not resume the session
//! - **Settings Readiness**: declared settings are fetched from
//!   `sys/<componentId>/<property>`, bounded by a timeout
//! - **Component Namespacing**: `{$componentId}` in topics is replaced with
//!   the component id
//! - **Pluggable Transport**: rumqttc by default, any [`Connector`] otherwise
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt_component::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! 	let mut config = ComponentConfig::localhost("thermostat");
//! 	config.settings = config.settings.with_required_settings(["interval"]);
//! 	let component = Component::new("thermostat", config)?;
//!
//! 	component
//! 		.route("sensors/{room}/temperature", |message, ctx| {
//! 			let room = message.param("room").unwrap_or_default().to_string();
//! 			let ctx = ctx.clone();
//! 			tokio::spawn(async move {
//! 				let topic = format!("{{$componentId}}/rooms/{room}/seen");
//! 				let _ = ctx.publish(&topic, "1", PublishOptions::default()).await;
//! 			});
//! 		})
//! 		.await?;
//!
//! 	component.start().await?;
//! 	component.wait_ready().await?;
//! 	println!("interval = {:?}", component.get("interval"));
//!
//! 	component.stop(false).await?;
//! 	Ok(())
//! }
//! ```

pub mod client;
pub mod connection;
pub mod payload;
pub mod routing;
pub mod settings;
pub mod topic;

// === Core Public API ===
pub use client::{
	Component, ComponentBuilder, ComponentConfig, ComponentError,
	ComponentSettings, ComponentSignal, HandlerContext, PublishOptions,
	SubscribeOptions,
};
pub use payload::Payload;
pub use routing::{RouteId, RouteOptions, RoutedMessage};
pub use settings::{MemoryStore, ReadinessState, SettingsStore};

// Essential external types
pub use rumqttc::QoS;

// === Transport ===
pub use connection::{
	AdapterError, AdapterEvent, ConnectAck, ConnectionAdapter, Connector,
	InboundMessage, RumqttcConnector, SubscriptionGrant,
};

// Topic pattern types (for manual pattern handling)
pub use topic::{TopicParams, TopicPatternError, TopicPatternPath};

/// Result type alias for operations that may fail with ComponentError
pub type Result<T> = std::result::Result<T, ComponentError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_component::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most components

	pub use crate::{
		Component, ComponentConfig, ComponentError, ComponentSettings,
		ComponentSignal, HandlerContext, Payload, PublishOptions, QoS,
		ReadinessState, RouteOptions, RoutedMessage, SubscribeOptions,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_component::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::{AdapterError, ComponentError, TopicPatternError};

	// Topic-related errors
	pub use crate::topic::{TopicError, TopicMatchError};

	// Routing errors
	pub use crate::routing::RouteError;
}
