mod adapter;
mod rumqttc_adapter;

pub use adapter::{
	AdapterError, AdapterEvent, AdapterEvents, ConnectAck, ConnectionAdapter,
	Connector, InboundMessage, SubscriptionGrant,
};
pub use rumqttc_adapter::{RumqttcAdapter, RumqttcConnector};
