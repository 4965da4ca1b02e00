//! State shared by the component handle, its dispatcher and its handlers.

use std::sync::{Arc, PoisonError, RwLock};

use arcstr::ArcStr;
use rumqttc::QoS;
use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use super::error::ComponentError;
use super::signal::ComponentSignal;
use crate::connection::{ConnectionAdapter, SubscriptionGrant};
use crate::payload::Payload;
use crate::settings::{ReadinessState, SettingsStore};
use crate::topic::{
	settings_topic, substitute_component_id, validation,
};

/// Options for outbound publishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PublishOptions {
	pub qos: QoS,
	pub retain: bool,
}

impl Default for PublishOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
			retain: false,
		}
	}
}

impl PublishOptions {
	pub fn with_qos(mut self, qos: QoS) -> Self {
		self.qos = qos;
		self
	}

	pub fn with_retain(mut self, retain: bool) -> Self {
		self.retain = retain;
		self
	}
}

/// Options for direct subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscribeOptions {
	pub qos: QoS,
}

impl Default for SubscribeOptions {
	fn default() -> Self {
		Self {
			qos: QoS::AtMostOnce,
		}
	}
}

pub(crate) struct Shared {
	pub(crate) component_id: ArcStr,
	pub(crate) store: Arc<dyn SettingsStore>,
	adapter: RwLock<Option<Arc<dyn ConnectionAdapter>>>,
	signals: broadcast::Sender<ComponentSignal>,
	readiness: watch::Sender<ReadinessState>,
}

impl Shared {
	pub(crate) fn new(
		component_id: ArcStr,
		store: Arc<dyn SettingsStore>,
		signal_capacity: usize,
	) -> Self {
		let (signals, _) = broadcast::channel(signal_capacity);
		let (readiness, _) = watch::channel(ReadinessState::Idle);
		Self {
			component_id,
			store,
			adapter: RwLock::new(None),
			signals,
			readiness,
		}
	}

	pub(crate) fn adapter(&self) -> Option<Arc<dyn ConnectionAdapter>> {
		self.adapter
			.read()
			.unwrap_or_else(PoisonError::into_inner)
			.clone()
	}

	pub(crate) fn replace_adapter(
		&self,
		adapter: Option<Arc<dyn ConnectionAdapter>>,
	) -> Option<Arc<dyn ConnectionAdapter>> {
		std::mem::replace(
			&mut *self.adapter.write().unwrap_or_else(PoisonError::into_inner),
			adapter,
		)
	}

	/// Adapter of a live connection.
	pub(crate) fn connected_adapter(&self) -> Option<Arc<dyn ConnectionAdapter>> {
		self.adapter().filter(|adapter| adapter.is_connected())
	}

	/// Broadcasts `signal` and returns how many receivers it reached.
	pub(crate) fn emit(&self, signal: ComponentSignal) -> usize {
		self.signals.send(signal).unwrap_or(0)
	}

	pub(crate) fn subscribe_signals(
		&self,
	) -> broadcast::Receiver<ComponentSignal> {
		self.signals.subscribe()
	}

	pub(crate) fn set_readiness(&self, state: ReadinessState) {
		self.readiness.send_replace(state);
	}

	pub(crate) fn watch_readiness(&self) -> watch::Receiver<ReadinessState> {
		self.readiness.subscribe()
	}

	pub(crate) fn readiness(&self) -> ReadinessState {
		*self.readiness.borrow()
	}

	pub(crate) fn normalize(&self, topic: &str) -> String {
		substitute_component_id(topic, &self.component_id)
	}
}

/// Component access handed to route handlers.
///
/// Cloning is cheap. Holding a context does not keep the dispatcher alive.
#[derive(Clone)]
pub struct HandlerContext {
	pub(crate) shared: Arc<Shared>,
}

impl HandlerContext {
	pub(crate) fn new(shared: Arc<Shared>) -> Self {
		Self { shared }
	}

	pub fn component_id(&self) -> &str {
		&self.shared.component_id
	}

	pub fn is_connected(&self) -> bool {
		self.shared.connected_adapter().is_some()
	}

	/// Publishes `payload` to `topic` after placeholder substitution.
	pub async fn publish(
		&self,
		topic: &str,
		payload: impl Into<Payload>,
		options: PublishOptions,
	) -> Result<(), ComponentError> {
		let topic = self.shared.normalize(topic);
		validation::validate_publish_topic(&topic)?;
		let payload = payload.into().encode()?;
		let adapter = self
			.shared
			.connected_adapter()
			.ok_or(ComponentError::NotConnected)?;
		debug!(topic = %topic, payload_size = payload.len(), qos = ?options.qos, retain = options.retain, "Publishing message");
		adapter
			.publish(topic, payload, options.qos, options.retain)
			.await?;
		Ok(())
	}

	/// Serializes `value` as JSON and publishes it.
	pub async fn publish_json<T: Serialize + ?Sized>(
		&self,
		topic: &str,
		value: &T,
		options: PublishOptions,
	) -> Result<(), ComponentError> {
		self.publish(topic, Payload::from_json(value)?, options)
			.await
	}

	/// Subscribes to a filter outside the route table. Matching messages are
	/// dispatched like any other: to a route if one matches, otherwise as
	/// an `Unmatched` signal.
	pub async fn subscribe(
		&self,
		topic: &str,
		options: SubscribeOptions,
	) -> Result<Vec<SubscriptionGrant>, ComponentError> {
		self.subscribe_many([(topic, options.qos)]).await
	}

	pub async fn subscribe_many<'a, I>(
		&self,
		filters: I,
	) -> Result<Vec<SubscriptionGrant>, ComponentError>
	where
		I: IntoIterator<Item = (&'a str, QoS)>,
	{
		let filters = filters
			.into_iter()
			.map(|(topic, qos)| {
				let filter = self.shared.normalize(topic);
				validation::validate_filter(&filter).map(|_| (filter, qos))
			})
			.collect::<Result<Vec<_>, _>>()?;
		let adapter = self
			.shared
			.connected_adapter()
			.ok_or(ComponentError::NotConnected)?;
		debug!(filters = ?filters, "Subscribing");
		Ok(adapter.subscribe(filters).await?)
	}

	pub async fn unsubscribe(&self, topic: &str) -> Result<(), ComponentError> {
		self.unsubscribe_many([topic]).await
	}

	pub async fn unsubscribe_many<'a, I>(
		&self,
		topics: I,
	) -> Result<(), ComponentError>
	where
		I: IntoIterator<Item = &'a str>,
	{
		let filters: Vec<String> = topics
			.into_iter()
			.map(|topic| self.shared.normalize(topic))
			.collect();
		let adapter = self
			.shared
			.connected_adapter()
			.ok_or(ComponentError::NotConnected)?;
		debug!(filters = ?filters, "Unsubscribing");
		Ok(adapter.unsubscribe(filters).await?)
	}

	/// Value stored under `key`.
	pub fn get(&self, key: &str) -> Option<Payload> {
		self.shared.store.get(key)
	}

	/// Value stored under `key`, or `default`.
	pub fn get_or(&self, key: &str, default: impl Into<Payload>) -> Payload {
		self.shared.store.get_or(key, default.into())
	}

	/// Writes `key` to the store; an existing value is kept unless
	/// `override_existing` is set.
	pub fn set(
		&self,
		key: &str,
		value: impl Into<Payload>,
		override_existing: bool,
	) {
		self.shared.store.set(key, value.into(), override_existing);
	}

	/// Stores a setting and, with `propagate`, publishes it retained on the
	/// component's settings topic. The local write happens even when
	/// propagation fails.
	pub async fn set_local(
		&self,
		property: &str,
		value: impl Into<Payload>,
		propagate: bool,
	) -> Result<(), ComponentError> {
		let value = value.into();
		self.shared.store.set(property, value.clone(), true);
		if !propagate {
			return Ok(());
		}
		if !self.is_connected() {
			warn!(property = %property, "Setting stored locally, not connected to propagate");
			return Err(ComponentError::propagation_without_connection(property));
		}
		let topic = settings_topic(&self.shared.component_id, property);
		self.publish(&topic, value, PublishOptions::default().with_retain(true))
			.await
	}

	pub fn readiness(&self) -> ReadinessState {
		self.shared.readiness()
	}
}
