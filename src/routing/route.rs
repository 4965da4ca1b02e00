//! Route declarations and the messages handed to route handlers

use std::fmt::{self, Display};
use std::sync::Arc;

use rumqttc::QoS;

use crate::client::HandlerContext;
use crate::connection::InboundMessage;
use crate::payload::Payload;
use crate::topic::{TopicParams, TopicPatternPath};

/// Identifier assigned to a route when it is added to a route table.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct RouteId(pub(crate) usize);

impl Display for RouteId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "RouteId({})", self.0)
	}
}

/// Per-route behavior.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RouteOptions {
	/// Subscribe to the route's filter on the broker
	pub subscribe: bool,
	/// Requested quality of service for the subscription
	pub qos: QoS,
	/// Remove the route after its first match
	pub once: bool,
}

impl Default for RouteOptions {
	fn default() -> Self {
		Self {
			subscribe: true,
			qos: QoS::AtMostOnce,
			once: false,
		}
	}
}

impl RouteOptions {
	/// Sets the subscription QoS.
	pub fn with_qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}

	/// Sets whether the route subscribes on the broker.
	pub fn with_subscribe(mut self, subscribe: bool) -> Self {
		self.subscribe = subscribe;
		self
	}

	/// Sets whether the route fires only once.
	pub fn with_once(mut self, once: bool) -> Self {
		self.once = once;
		self
	}
}

/// A message delivered to a route handler.
#[derive(Debug, Clone)]
pub struct RoutedMessage {
	/// The inbound message
	pub message: InboundMessage,
	/// Parameters extracted from the topic by the route's pattern
	pub params: TopicParams,
}

impl RoutedMessage {
	/// Topic the message arrived on.
	pub fn topic(&self) -> &str {
		&self.message.topic
	}

	/// Value of a named topic parameter.
	pub fn param(&self, name: &str) -> Option<&str> {
		self.params.get(name)
	}

	/// Payload decoded as JSON when possible.
	pub fn payload(&self) -> Payload {
		Payload::decode(self.message.payload.clone())
	}
}

/// Handles messages matched by a route.
///
/// Handlers run on the dispatcher task one message at a time; long running
/// work should be spawned.
pub trait RouteHandler: Send + Sync + 'static {
	/// Called with the matched message and the component context.
	fn handle(&self, message: RoutedMessage, context: &HandlerContext);
}

impl<F> RouteHandler for F
where F: Fn(RoutedMessage, &HandlerContext) + Send + Sync + 'static
{
	fn handle(&self, message: RoutedMessage, context: &HandlerContext) {
		self(message, context)
	}
}

/// Shared handler type stored in the component's route table.
pub type SharedHandler = Arc<dyn RouteHandler>;

/// A compiled pattern, its handler and options.
#[derive(Clone)]
pub struct Route<H = SharedHandler> {
	pattern: TopicPatternPath,
	handler: H,
	options: RouteOptions,
}

impl<H> Route<H> {
	/// Creates a route.
	pub fn new(pattern: TopicPatternPath, handler: H, options: RouteOptions) -> Self {
		Self {
			pattern,
			handler,
			options,
		}
	}

	/// The route's compiled pattern.
	pub fn pattern(&self) -> &TopicPatternPath {
		&self.pattern
	}

	/// The route's handler.
	pub fn handler(&self) -> &H {
		&self.handler
	}

	/// The route's options.
	pub fn options(&self) -> RouteOptions {
		self.options
	}
}

impl<H> fmt::Debug for Route<H> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Route")
			.field("pattern", &self.pattern.topic_pattern())
			.field("options", &self.options)
			.finish()
	}
}
