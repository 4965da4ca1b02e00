//! Dispatcher actor.
//!
//! A single task owns the route table and the readiness gate. It consumes
//! commands from component handles, events from the current connection
//! adapter and the readiness deadline, one at a time.

use std::sync::Arc;

use rumqttc::QoS;
use tokio::sync::{mpsc, oneshot};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use super::config::ComponentSettings;
use super::context::{HandlerContext, Shared};
use super::error::ComponentError;
use super::signal::ComponentSignal;
use crate::connection::{
	AdapterError, AdapterEvent, AdapterEvents, ConnectAck, Connector,
	InboundMessage,
};
use crate::payload::Payload;
use crate::routing::{Route, RouteId, RouteTable, RoutedMessage};
use crate::settings::{ReadinessGate, ReadinessTransition};
use crate::topic::{settings_property, settings_topic};

pub(crate) type Reply<T> = oneshot::Sender<Result<T, ComponentError>>;

pub(crate) enum Command {
	Start {
		response_tx: Reply<ConnectAck>,
	},
	Stop {
		force: bool,
		response_tx: Reply<()>,
	},
	AddRoute {
		route: Route,
		response_tx: Reply<RouteId>,
	},
	RemoveRoute {
		id: RouteId,
		response_tx: Reply<()>,
	},
}

enum Lifecycle {
	Stopped,
	Connecting(Reply<ConnectAck>),
	Connected,
}

pub(crate) struct DispatcherActor {
	context: HandlerContext,
	connector: Arc<dyn Connector>,
	routes: RouteTable,
	readiness: ReadinessGate,
	settings_qos: QoS,
	subscribe_while_connected: bool,
	command_rx: mpsc::Receiver<Command>,
	events: Option<AdapterEvents>,
	lifecycle: Lifecycle,
	close_signalled: bool,
}

impl DispatcherActor {
	pub(crate) fn spawn(
		shared: Arc<Shared>,
		connector: Arc<dyn Connector>,
		settings: &ComponentSettings,
	) -> mpsc::Sender<Command> {
		let (command_tx, command_rx) =
			mpsc::channel(settings.command_channel_capacity);
		let actor = Self {
			context: HandlerContext::new(shared),
			connector,
			routes: RouteTable::new(),
			readiness: ReadinessGate::new(
				settings.required_settings.iter().cloned(),
				settings.settings_timeout,
			),
			settings_qos: settings.settings_qos,
			subscribe_while_connected: settings.subscribe_while_connected,
			command_rx,
			events: None,
			lifecycle: Lifecycle::Stopped,
			close_signalled: false,
		};
		tokio::spawn(actor.run());
		command_tx
	}

	async fn run(mut self) {
		loop {
			let deadline = self.readiness.deadline();
			tokio::select! {
				cmd = self.command_rx.recv() => {
					match cmd {
						| Some(cmd) => self.handle_command(cmd).await,
						| None => {
							info!(component_id = %self.component_id(), "All component handles dropped, stopping dispatcher");
							break;
						}
					}
				}
				event = next_event(&mut self.events) => {
					match event {
						| Some(event) => self.handle_event(event).await,
						| None => self.handle_events_closed(),
					}
				}
				_ = sleep_until(deadline) => {
					self.handle_readiness_timeout().await;
				}
			}
		}
		if !matches!(self.lifecycle, Lifecycle::Stopped) {
			self.teardown(true).await;
		}
	}

	fn component_id(&self) -> &str {
		&self.context.shared.component_id
	}

	async fn handle_command(&mut self, cmd: Command) {
		match cmd {
			| Command::Start { response_tx } => self.handle_start(response_tx).await,
			| Command::Stop { force, response_tx } => {
				let result = self.handle_stop(force).await;
				let _ = response_tx.send(result);
			}
			| Command::AddRoute { route, response_tx } => {
				let result = self.handle_add_route(route).await;
				let _ = response_tx.send(result);
			}
			| Command::RemoveRoute { id, response_tx } => {
				let result = self.handle_remove_route(id).await;
				let _ = response_tx.send(result);
			}
		}
	}

	async fn handle_start(&mut self, response_tx: Reply<ConnectAck>) {
		if !matches!(self.lifecycle, Lifecycle::Stopped) {
			let _ = response_tx.send(Err(ComponentError::AlreadyStarted));
			return;
		}
		match self.connector.connect().await {
			| Ok((adapter, events)) => {
				info!(component_id = %self.component_id(), "Connecting component");
				self.context.shared.replace_adapter(Some(adapter));
				self.events = Some(events);
				self.close_signalled = false;
				self.lifecycle = Lifecycle::Connecting(response_tx);
			}
			| Err(err) => {
				error!(component_id = %self.component_id(), error = %err, "Failed to open connection");
				let _ = response_tx.send(Err(err.into()));
			}
		}
	}

	async fn handle_stop(&mut self, force: bool) -> Result<(), ComponentError> {
		match std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped) {
			| Lifecycle::Stopped => return Err(ComponentError::NotConnected),
			| Lifecycle::Connecting(pending) => {
				let _ = pending.send(Err(ComponentError::ConnectionClosed));
			}
			| Lifecycle::Connected => {}
		}
		info!(component_id = %self.component_id(), force = force, "Stopping component");
		self.teardown(force).await;
		if !self.close_signalled {
			self.context.shared.emit(ComponentSignal::Closed);
		}
		Ok(())
	}

	/// Ends the current adapter and returns to `Stopped`.
	async fn teardown(&mut self, force: bool) {
		self.lifecycle = Lifecycle::Stopped;
		self.events = None;
		if let Some(adapter) = self.context.shared.replace_adapter(None) {
			if let Err(e) = adapter.end(force).await {
				warn!(error = %e, "Failed to end connection");
			}
		}
	}

	async fn handle_add_route(
		&mut self,
		route: Route,
	) -> Result<RouteId, ComponentError> {
		let filter = route.pattern().mqtt_pattern();
		let options = route.options();
		let id = self.routes.add(route)?;
		debug!(route_id = %id, filter = %filter, "Route added");

		if !(options.subscribe
			&& self.subscribe_while_connected
			&& matches!(self.lifecycle, Lifecycle::Connected))
		{
			return Ok(id);
		}
		let Some(adapter) = self.context.shared.connected_adapter() else {
			return Ok(id);
		};
		if let Err(err) = adapter
			.subscribe(vec![(filter.to_string(), options.qos)])
			.await
		{
			warn!(filter = %filter, error = %err, "Route subscription failed, removing route");
			let _ = self.routes.remove(id);
			return Err(err.into());
		}
		Ok(id)
	}

	async fn handle_remove_route(
		&mut self,
		id: RouteId,
	) -> Result<(), ComponentError> {
		let route = self.routes.remove(id)?;
		debug!(route_id = %id, "Route removed");
		if route.options().subscribe {
			self.release_filter(route.pattern().mqtt_pattern().as_str())
				.await;
		}
		Ok(())
	}

	/// Unsubscribes `filter` unless another subscribing route still uses it.
	async fn release_filter(&self, filter: &str) {
		if self.routes.is_filter_subscribed(filter) {
			return;
		}
		let Some(adapter) = self.context.shared.connected_adapter() else {
			return;
		};
		if let Err(err) = adapter.unsubscribe(vec![filter.to_string()]).await {
			warn!(filter = %filter, error = %err, "Failed to unsubscribe");
		}
	}

	async fn handle_event(&mut self, event: AdapterEvent) {
		match event {
			| AdapterEvent::Connect(ack) => self.handle_connect(ack).await,
			| AdapterEvent::Reconnect => {
				debug!("Reconnecting");
				self.context.shared.emit(ComponentSignal::Reconnecting);
			}
			| AdapterEvent::Offline => {
				warn!(component_id = %self.component_id(), "Connection lost");
				self.context.shared.emit(ComponentSignal::Offline);
			}
			| AdapterEvent::Close => self.handle_close().await,
			| AdapterEvent::Error(err) => self.handle_error(err).await,
			| AdapterEvent::Message(message) => self.dispatch(message).await,
		}
	}

	async fn handle_connect(&mut self, ack: ConnectAck) {
		self.close_signalled = false;
		self.context.shared.emit(ComponentSignal::Connected(ack));

		let subscribed = if ack.session_present {
			debug!("Session resumed, keeping broker subscriptions");
			Ok(())
		} else {
			self.subscribe_all().await
		};

		match std::mem::replace(&mut self.lifecycle, Lifecycle::Connected) {
			| Lifecycle::Connecting(response_tx) => {
				if let Err(err) = subscribed {
					error!(error = %err, "Initial subscriptions failed");
					self.teardown(true).await;
					let _ = response_tx.send(Err(err.into()));
					return;
				}
				self.begin_readiness();
				info!(component_id = %self.component_id(), session_present = ack.session_present, "Component started");
				let _ = response_tx.send(Ok(ack));
			}
			| Lifecycle::Connected => {
				if let Err(err) = subscribed {
					error!(error = %err, "Resubscription failed");
					self.context
						.shared
						.emit(ComponentSignal::Error(Arc::new(err)));
				}
			}
			| Lifecycle::Stopped => {
				// Stale event from an adapter that was already torn down.
				self.lifecycle = Lifecycle::Stopped;
			}
		}
	}

	/// Subscribes every route target and every declared settings topic.
	async fn subscribe_all(&self) -> Result<(), AdapterError> {
		let mut filters: Vec<(String, QoS)> = self
			.routes
			.subscription_targets()
			.into_iter()
			.map(|(filter, qos)| (filter.to_string(), qos))
			.collect();
		filters.sort_by(|a, b| a.0.cmp(&b.0));
		filters.extend(self.readiness.declared().iter().map(|property| {
			(settings_topic(self.component_id(), property), self.settings_qos)
		}));
		if filters.is_empty() {
			return Ok(());
		}
		let Some(adapter) = self.context.shared.adapter() else {
			return Err(AdapterError::Closed);
		};
		debug!(count = filters.len(), "Subscribing routes and settings");
		adapter.subscribe(filters).await.map(|_| ())
	}

	async fn handle_close(&mut self) {
		info!(component_id = %self.component_id(), "Connection closed");
		self.close_signalled = true;
		self.context.shared.emit(ComponentSignal::Closed);
		if let Lifecycle::Connecting(_) = self.lifecycle {
			self.fail_start(ComponentError::ConnectionClosed).await;
		}
	}

	async fn handle_error(&mut self, err: AdapterError) {
		if let Lifecycle::Connecting(_) = self.lifecycle {
			error!(error = %err, "Connection failed before start completed");
			self.fail_start(err.into()).await;
			return;
		}
		warn!(error = %err, "Connection error");
		self.context
			.shared
			.emit(ComponentSignal::Error(Arc::new(err)));
	}

	async fn fail_start(&mut self, err: ComponentError) {
		let pending = std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped);
		self.teardown(true).await;
		if let Lifecycle::Connecting(response_tx) = pending {
			let _ = response_tx.send(Err(err));
		}
	}

	fn handle_events_closed(&mut self) {
		self.events = None;
		let previous = std::mem::replace(&mut self.lifecycle, Lifecycle::Stopped);
		self.context.shared.replace_adapter(None);
		match previous {
			| Lifecycle::Connecting(response_tx) => {
				let _ = response_tx.send(Err(ComponentError::ConnectionClosed));
			}
			| Lifecycle::Connected if !self.close_signalled => {
				self.context.shared.emit(ComponentSignal::Closed);
			}
			| _ => {}
		}
		info!(component_id = %self.component_id(), "Connection event stream ended");
	}

	async fn dispatch(&mut self, message: InboundMessage) {
		if let Some(property) =
			settings_property(&message.topic, self.component_id())
		{
			let property = property.to_string();
			self.handle_setting(&property, Payload::decode(message.payload));
			return;
		}

		let Some(matched) = self.routes.first_match(&message.topic) else {
			debug!(topic = %message.topic, "No route matched");
			let topic = message.topic.clone();
			let reached = self
				.context
				.shared
				.emit(ComponentSignal::Unmatched(message));
			if reached == 0 {
				warn!(topic = %topic, "Unmatched message dropped, no signal receivers");
			}
			return;
		};
		let id = matched.id;
		let params = matched.params;
		let handler = matched.route.handler().clone();
		let once = matched.route.options().once;

		if once {
			if let Ok(route) = self.routes.remove(id) {
				debug!(route_id = %id, "One-shot route consumed");
				if route.options().subscribe {
					self.release_filter(route.pattern().mqtt_pattern().as_str())
						.await;
				}
			}
		}

		debug!(topic = %message.topic, route_id = %id, "Dispatching message");
		handler.handle(RoutedMessage { message, params }, &self.context);
	}

	fn handle_setting(&mut self, property: &str, value: Payload) {
		debug!(property = %property, "Setting received");
		self.context.shared.store.set(property, value.clone(), true);
		if let Some(transition) = self.readiness.on_setting(property, value) {
			self.apply_readiness(transition);
		}
	}

	fn begin_readiness(&mut self) {
		if let Some(transition) = self.readiness.begin(Instant::now()) {
			self.apply_readiness(transition);
		} else {
			self.context.shared.set_readiness(self.readiness.state());
		}
	}

	async fn handle_readiness_timeout(&mut self) {
		// Events queued before the deadline fired are handled first, so a
		// settings message already delivered still counts.
		while let Some(rx) = self.events.as_mut() {
			match rx.try_recv() {
				| Ok(event) => self.handle_event(event).await,
				| Err(_) => break,
			}
		}
		if let Some(transition) = self.readiness.on_timeout(Instant::now()) {
			self.apply_readiness(transition);
		}
	}

	fn apply_readiness(&self, transition: ReadinessTransition) {
		self.context.shared.set_readiness(self.readiness.state());
		match transition {
			| ReadinessTransition::Ready => {
				info!(component_id = %self.component_id(), "Component ready");
				self.context.shared.emit(ComponentSignal::Ready);
			}
			| ReadinessTransition::TimedOut => {
				let missing: Vec<&String> = self
					.readiness
					.declared()
					.iter()
					.filter(|p| !self.readiness.received().contains_key(*p))
					.collect();
				warn!(component_id = %self.component_id(), missing = ?missing, "Settings timed out");
				self.context.shared.emit(ComponentSignal::Timeout);
			}
		}
	}
}

async fn next_event(events: &mut Option<AdapterEvents>) -> Option<AdapterEvent> {
	match events {
		| Some(rx) => rx.recv().await,
		| None => std::future::pending().await,
	}
}

async fn sleep_until(deadline: Option<Instant>) {
	match deadline {
		| Some(deadline) => time::sleep_until(deadline).await,
		| None => std::future::pending().await,
	}
}
