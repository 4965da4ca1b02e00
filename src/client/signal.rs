use std::sync::Arc;

use crate::connection::{AdapterError, ConnectAck, InboundMessage};

/// Notifications broadcast by a component.
///
/// Receivers that fall behind lose the oldest signals; the readiness state
/// can always be read back through `Component::readiness`.
#[derive(Debug, Clone)]
pub enum ComponentSignal {
	/// Broker connection established or re-established
	Connected(ConnectAck),
	/// The connection is being re-established
	Reconnecting,
	/// The connection was closed
	Closed,
	/// The connection was lost
	Offline,
	/// Connection error after start
	Error(Arc<AdapterError>),
	/// Inbound message no route matched
	Unmatched(InboundMessage),
	/// Declared settings did not arrive in time
	Timeout,
	/// All declared settings arrived
	Ready,
}
