use std::sync::Arc;

use arcstr::ArcStr;
use rumqttc::QoS;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot};

use super::config::{ComponentConfig, ComponentSettings};
use super::context::{HandlerContext, PublishOptions, Shared, SubscribeOptions};
use super::dispatcher::{Command, DispatcherActor};
use super::error::ComponentError;
use super::signal::ComponentSignal;
use crate::connection::{
	ConnectAck, Connector, RumqttcConnector, SubscriptionGrant,
};
use crate::payload::Payload;
use crate::routing::{
	Route, RouteHandler, RouteId, RouteOptions, RoutedMessage, SharedHandler,
};
use crate::settings::{MemoryStore, ReadinessState, SettingsStore};
use crate::topic::TopicPatternPath;

/// A broker-connected component.
///
/// `Component` is a cheap handle; clones share the same dispatcher,
/// connection and store. The dispatcher stops once every handle is dropped.
///
/// ```rust,no_run
/// use mqtt_component::{Component, ComponentConfig, PublishOptions};
///
/// # async fn demo() -> Result<(), mqtt_component::ComponentError> {
/// let component = Component::new("lamp", ComponentConfig::localhost("lamp"))?;
/// component
/// 	.route("{$componentId}/set/{state}", |message, _ctx| {
/// 		println!("switch to {:?}", message.param("state"));
/// 	})
/// 	.await?;
/// component.start().await?;
/// component
/// 	.publish("{$componentId}/status", "online", PublishOptions::default())
/// 	.await?;
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Component {
	context: HandlerContext,
	command_tx: mpsc::Sender<Command>,
	default_route_options: RouteOptions,
}

impl Component {
	/// Creates a component connecting through rumqttc.
	pub fn new(
		component_id: impl Into<ArcStr>,
		config: ComponentConfig,
	) -> Result<Self, ComponentError> {
		Self::builder(component_id).config(config).build()
	}

	pub fn builder(component_id: impl Into<ArcStr>) -> ComponentBuilder {
		ComponentBuilder::new(component_id)
	}

	pub fn component_id(&self) -> &str {
		self.context.component_id()
	}

	/// Context handed to route handlers, usable from spawned tasks.
	pub fn context(&self) -> HandlerContext {
		self.context.clone()
	}

	/// True while the broker connection is up.
	pub fn is_connected(&self) -> bool {
		self.context.is_connected()
	}

	/// Connects to the broker, subscribes routes and settings and begins the
	/// readiness protocol. Resolves with the first connection ack.
	pub async fn start(&self) -> Result<ConnectAck, ComponentError> {
		self.request(|response_tx| Command::Start { response_tx })
			.await
	}

	/// Closes the connection. The component may be started again.
	pub async fn stop(&self, force: bool) -> Result<(), ComponentError> {
		self.request(|response_tx| Command::Stop { force, response_tx })
			.await
	}

	/// Declares a route with the default route options.
	pub async fn route<F>(
		&self,
		topic: &str,
		handler: F,
	) -> Result<RouteId, ComponentError>
	where
		F: Fn(RoutedMessage, &HandlerContext) + Send + Sync + 'static,
	{
		self.route_with_options(topic, handler, self.default_route_options)
			.await
	}

	pub async fn route_with_options<F>(
		&self,
		topic: &str,
		handler: F,
		options: RouteOptions,
	) -> Result<RouteId, ComponentError>
	where
		F: Fn(RoutedMessage, &HandlerContext) + Send + Sync + 'static,
	{
		self.add_route(topic, Arc::new(handler), options).await
	}

	/// Declares a route served by a shared handler.
	pub async fn route_handler(
		&self,
		topic: &str,
		handler: Arc<dyn RouteHandler>,
		options: RouteOptions,
	) -> Result<RouteId, ComponentError> {
		self.add_route(topic, handler, options).await
	}

	async fn add_route(
		&self,
		topic: &str,
		handler: SharedHandler,
		options: RouteOptions,
	) -> Result<RouteId, ComponentError> {
		let pattern = TopicPatternPath::new(self.context.shared.normalize(topic))?;
		let route = Route::new(pattern, handler, options);
		self.request(|response_tx| Command::AddRoute { route, response_tx })
			.await
	}

	/// Removes a route and releases its subscription when no other route
	/// needs it.
	pub async fn unroute(&self, id: RouteId) -> Result<(), ComponentError> {
		self.request(|response_tx| Command::RemoveRoute { id, response_tx })
			.await
	}

	pub async fn publish(
		&self,
		topic: &str,
		payload: impl Into<Payload>,
		options: PublishOptions,
	) -> Result<(), ComponentError> {
		self.context.publish(topic, payload, options).await
	}

	pub async fn publish_json<T: Serialize + ?Sized>(
		&self,
		topic: &str,
		value: &T,
		options: PublishOptions,
	) -> Result<(), ComponentError> {
		self.context.publish_json(topic, value, options).await
	}

	pub async fn subscribe(
		&self,
		topic: &str,
		options: SubscribeOptions,
	) -> Result<Vec<SubscriptionGrant>, ComponentError> {
		self.context.subscribe(topic, options).await
	}

	pub async fn subscribe_many<'a, I>(
		&self,
		filters: I,
	) -> Result<Vec<SubscriptionGrant>, ComponentError>
	where
		I: IntoIterator<Item = (&'a str, QoS)>,
	{
		self.context.subscribe_many(filters).await
	}

	pub async fn unsubscribe(&self, topic: &str) -> Result<(), ComponentError> {
		self.context.unsubscribe(topic).await
	}

	pub async fn unsubscribe_many<'a, I>(
		&self,
		topics: I,
	) -> Result<(), ComponentError>
	where
		I: IntoIterator<Item = &'a str>,
	{
		self.context.unsubscribe_many(topics).await
	}

	pub fn get(&self, key: &str) -> Option<Payload> {
		self.context.get(key)
	}

	pub fn get_or(&self, key: &str, default: impl Into<Payload>) -> Payload {
		self.context.get_or(key, default)
	}

	pub fn set(
		&self,
		key: &str,
		value: impl Into<Payload>,
		override_existing: bool,
	) {
		self.context.set(key, value, override_existing)
	}

	/// See [`HandlerContext::set_local`].
	pub async fn set_local(
		&self,
		property: &str,
		value: impl Into<Payload>,
		propagate: bool,
	) -> Result<(), ComponentError> {
		self.context.set_local(property, value, propagate).await
	}

	pub fn readiness(&self) -> ReadinessState {
		self.context.readiness()
	}

	/// Waits until the component is ready. Fails with `ReadinessTimedOut`
	/// when the settings timeout elapsed first.
	pub async fn wait_ready(&self) -> Result<(), ComponentError> {
		let mut readiness = self.context.shared.watch_readiness();
		loop {
			match *readiness.borrow_and_update() {
				| ReadinessState::Ready => return Ok(()),
				| ReadinessState::TimedOut => {
					return Err(ComponentError::ReadinessTimedOut);
				}
				| ReadinessState::Idle | ReadinessState::AwaitingSettings => {}
			}
			readiness
				.changed()
				.await
				.map_err(|_| ComponentError::DispatcherStopped)?;
		}
	}

	/// Subscribes to component signals emitted from now on.
	///
	/// Signals travel on a bounded broadcast channel sized by
	/// `signal_channel_capacity`. A receiver that falls further behind gets
	/// `RecvError::Lagged(n)` and the `n` oldest signals are gone, including
	/// the contents of any `Unmatched` messages among them.
	pub fn signals(&self) -> broadcast::Receiver<ComponentSignal> {
		self.context.shared.subscribe_signals()
	}

	async fn request<T>(
		&self,
		command: impl FnOnce(oneshot::Sender<Result<T, ComponentError>>) -> Command,
	) -> Result<T, ComponentError> {
		let (response_tx, response_rx) = oneshot::channel();
		self.command_tx
			.send(command(response_tx))
			.await
			.map_err(|_| ComponentError::DispatcherStopped)?;
		response_rx
			.await
			.map_err(|_| ComponentError::DispatcherStopped)?
	}
}

/// Builder for [`Component`].
///
/// A connector or connection options must be supplied; the store defaults
/// to a fresh [`MemoryStore`].
pub struct ComponentBuilder {
	component_id: ArcStr,
	settings: ComponentSettings,
	connection: Option<rumqttc::MqttOptions>,
	connector: Option<Arc<dyn Connector>>,
	store: Option<Arc<dyn SettingsStore>>,
}

impl ComponentBuilder {
	fn new(component_id: impl Into<ArcStr>) -> Self {
		Self {
			component_id: component_id.into(),
			settings: ComponentSettings::default(),
			connection: None,
			connector: None,
			store: None,
		}
	}

	/// Uses rumqttc with the given connection options and settings.
	pub fn config(mut self, config: ComponentConfig) -> Self {
		self.connection = Some(config.connection);
		self.settings = config.settings;
		self
	}

	pub fn settings(mut self, settings: ComponentSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Declares the settings the component waits for before it is ready.
	pub fn required_settings<I, S>(mut self, settings: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.settings = self.settings.with_required_settings(settings);
		self
	}

	/// Uses a custom connector instead of rumqttc.
	pub fn connector(mut self, connector: impl Connector) -> Self {
		self.connector = Some(Arc::new(connector));
		self
	}

	/// Uses a store shared with other owners.
	pub fn store(mut self, store: Arc<dyn SettingsStore>) -> Self {
		self.store = Some(store);
		self
	}

	/// Spawns the dispatcher. Must be called inside a Tokio runtime.
	pub fn build(self) -> Result<Component, ComponentError> {
		self.settings
			.validate()
			.map_err(ComponentError::ConfigurationValue)?;
		if self.component_id.is_empty() {
			return Err(ComponentError::ConfigurationValue(
				"component id must not be empty".to_string(),
			));
		}

		let connector: Arc<dyn Connector> = match (self.connector, self.connection) {
			| (Some(connector), _) => connector,
			| (None, Some(options)) => Arc::new(RumqttcConnector::new(
				options,
				self.settings.event_loop_capacity,
				self.settings.event_channel_capacity,
			)),
			| (None, None) => {
				return Err(ComponentError::ConfigurationValue(
					"no broker connection configured".to_string(),
				));
			}
		};
		let store: Arc<dyn SettingsStore> = match self.store {
			| Some(store) => store,
			| None => Arc::new(MemoryStore::new()),
		};

		let shared = Arc::new(Shared::new(
			self.component_id,
			store,
			self.settings.signal_channel_capacity,
		));
		let command_tx =
			DispatcherActor::spawn(shared.clone(), connector, &self.settings);
		Ok(Component {
			context: HandlerContext::new(shared),
			command_tx,
			default_route_options: self.settings.default_route_options,
		})
	}
}
