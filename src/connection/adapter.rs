//! Contract between the component and the broker connection.
//!
//! The component never talks to a broker client directly. A [`Connector`]
//! opens a connection and hands back a [`ConnectionAdapter`] for outbound
//! operations together with the ordered stream of [`AdapterEvent`]s.

use std::sync::Arc;

use arcstr::ArcStr;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::QoS;
use thiserror::Error;
use tokio::sync::mpsc;

/// Connection acknowledgement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectAck {
	/// Broker resumed an existing session, subscriptions included
	pub session_present: bool,
}

/// A message received from the broker.
#[derive(Debug, Clone)]
pub struct InboundMessage {
	pub topic: ArcStr,
	pub payload: Bytes,
	pub qos: QoS,
	pub retain: bool,
	pub dup: bool,
}

impl InboundMessage {
	/// Creates a QoS 0, non-retained message.
	pub fn new(topic: impl Into<ArcStr>, payload: impl Into<Bytes>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			qos: QoS::AtMostOnce,
			retain: false,
			dup: false,
		}
	}
}

/// Outcome of one subscription request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionGrant {
	pub filter: String,
	pub qos: QoS,
}

/// Errors reported by a connection adapter
#[derive(Debug, Error)]
pub enum AdapterError {
	/// Request could not be handed to the client
	#[error("Client operation failed: {0}")]
	Client(#[from] rumqttc::ClientError),

	/// Network or protocol failure
	#[error("Network connection failed: {0}")]
	Network(#[from] rumqttc::ConnectionError),

	/// Broker refused the connection
	#[error("Broker rejected connection: {code:?}")]
	BrokerRejected { code: rumqttc::ConnectReturnCode },

	/// Connection is gone
	#[error("Connection closed")]
	Closed,

	/// Adapter specific failure
	#[error("{0}")]
	Other(String),
}

/// Lifecycle and traffic events, delivered in order.
#[derive(Debug)]
pub enum AdapterEvent {
	/// Connection (re)established
	Connect(ConnectAck),
	/// A reconnection attempt is starting
	Reconnect,
	/// Connection closed
	Close,
	/// Connection lost
	Offline,
	/// Connection level error
	Error(AdapterError),
	/// Inbound publish
	Message(InboundMessage),
}

/// Receiving half of an adapter's event stream.
pub type AdapterEvents = mpsc::Receiver<AdapterEvent>;

/// Outbound operations on an open broker connection.
///
/// Implementations must be callable from several tasks at once; each call
/// resolves exactly once with the outcome of the network operation.
#[async_trait]
pub trait ConnectionAdapter: Send + Sync + 'static {
	/// Subscribes to the given filters.
	async fn subscribe(
		&self,
		filters: Vec<(String, QoS)>,
	) -> Result<Vec<SubscriptionGrant>, AdapterError>;

	/// Unsubscribes from the given filters.
	async fn unsubscribe(&self, filters: Vec<String>)
	-> Result<(), AdapterError>;

	/// Publishes a message.
	async fn publish(
		&self,
		topic: String,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	) -> Result<(), AdapterError>;

	/// Closes the connection. With `force` in-flight work is abandoned.
	async fn end(&self, force: bool) -> Result<(), AdapterError>;

	/// True while the broker connection is up.
	fn is_connected(&self) -> bool;
}

/// Opens broker connections.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
	/// Starts a connection attempt. Success is reported later through an
	/// [`AdapterEvent::Connect`] on the returned stream.
	async fn connect(
		&self,
	) -> Result<(Arc<dyn ConnectionAdapter>, AdapterEvents), AdapterError>;
}
