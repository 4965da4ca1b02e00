//! Configuration for component initialization

use std::time::Duration;

use rumqttc::{MqttOptions, OptionError, QoS};

use crate::routing::RouteOptions;

/// Default time allowed for declared settings to arrive
pub const DEFAULT_SETTINGS_TIMEOUT: Duration = Duration::from_millis(10_000);

/// Component-level behavior and capacity settings
#[derive(Debug, Clone)]
pub struct ComponentSettings {
	/// Settings properties that must arrive before the component is ready
	pub required_settings: Vec<String>,
	/// How long to wait for required settings; `None` waits forever
	pub settings_timeout: Option<Duration>,
	/// QoS used for settings topic subscriptions
	pub settings_qos: QoS,
	/// Subscribe routes declared while connected right away
	pub subscribe_while_connected: bool,
	/// Options used by `Component::route`
	pub default_route_options: RouteOptions,
	/// Capacity of the dispatcher command channel (must be > 0)
	pub command_channel_capacity: usize,
	/// Capacity of the signal broadcast channel (must be > 0)
	pub signal_channel_capacity: usize,
	/// Capacity of the adapter event channel (must be > 0)
	pub event_channel_capacity: usize,
	/// Capacity of the rumqttc request channel (must be > 0)
	pub event_loop_capacity: usize,
}

impl Default for ComponentSettings {
	fn default() -> Self {
		Self {
			required_settings: Vec::new(),
			settings_timeout: Some(DEFAULT_SETTINGS_TIMEOUT),
			settings_qos: QoS::AtMostOnce,
			subscribe_while_connected: true,
			default_route_options: RouteOptions::default(),
			command_channel_capacity: 100,
			signal_channel_capacity: 64,
			event_channel_capacity: 256,
			event_loop_capacity: 64,
		}
	}
}

impl ComponentSettings {
	/// Declares the settings the component waits for.
	pub fn with_required_settings<I, S>(mut self, settings: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.required_settings = settings.into_iter().map(Into::into).collect();
		self
	}

	/// Sets the settings timeout; `None` disables it.
	pub fn with_settings_timeout(mut self, timeout: Option<Duration>) -> Self {
		self.settings_timeout = timeout;
		self
	}

	pub(crate) fn validate(&self) -> Result<(), String> {
		let capacities = [
			("command_channel_capacity", self.command_channel_capacity),
			("signal_channel_capacity", self.signal_channel_capacity),
			("event_channel_capacity", self.event_channel_capacity),
			("event_loop_capacity", self.event_loop_capacity),
		];
		for (name, value) in capacities {
			if value == 0 {
				return Err(format!("{name} must be greater than 0"));
			}
		}
		// Each name becomes the last level of a settings topic.
		for property in &self.required_settings {
			if property.is_empty() || property.contains(['/', '+', '#']) {
				return Err(format!(
					"required setting '{property}' must be a non-empty name \
					 without '/', '+' or '#'"
				));
			}
		}
		Ok(())
	}
}

/// Configuration for component creation
#[derive(Debug, Clone)]
pub struct ComponentConfig {
	/// Underlying MQTT connection options (from rumqttc)
	pub connection: MqttOptions,
	/// Component-level behavior settings
	pub settings: ComponentSettings,
}

impl ComponentConfig {
	/// Creates a config whose broker client id is the component id.
	///
	/// # Example
	/// ```rust
	/// use mqtt_component::ComponentConfig;
	///
	/// let config = ComponentConfig::new("sensor-1", "broker.hivemq.com", 1883);
	/// assert_eq!(config.connection.client_id(), "sensor-1");
	/// ```
	pub fn new(component_id: &str, host: &str, port: u16) -> Self {
		Self {
			connection: MqttOptions::new(component_id, host, port),
			settings: ComponentSettings::default(),
		}
	}

	/// Parses connection options from a broker URL.
	///
	/// Supports tcp://, mqtt://, ssl://, mqtts://, ws:// and wss://. When the
	/// URL carries no `client_id` query parameter the component id is used.
	///
	/// # Example
	/// ```rust
	/// use mqtt_component::ComponentConfig;
	///
	/// let config = ComponentConfig::from_url("sensor-1", "mqtt://localhost:1883")?;
	/// assert_eq!(config.connection.client_id(), "sensor-1");
	/// # Ok::<(), rumqttc::OptionError>(())
	/// ```
	pub fn from_url(component_id: &str, url: &str) -> Result<Self, OptionError> {
		Ok(Self {
			connection: MqttOptions::parse_url(with_client_id(url, component_id))?,
			settings: ComponentSettings::default(),
		})
	}

	/// Connects to localhost:1883.
	pub fn localhost(component_id: &str) -> Self {
		Self::new(component_id, "localhost", 1883)
	}

	/// Replaces the component settings.
	pub fn with_settings(mut self, settings: ComponentSettings) -> Self {
		self.settings = settings;
		self
	}
}

fn with_client_id(url: &str, component_id: &str) -> String {
	let has_client_id = url
		.split_once('?')
		.map(|(_, query)| {
			query.split('&').any(|pair| pair.starts_with("client_id="))
		})
		.unwrap_or(false);
	if has_client_id {
		url.to_string()
	} else if url.contains('?') {
		format!("{url}&client_id={component_id}")
	} else {
		format!("{url}?client_id={component_id}")
	}
}
