//! In-process connector used to drive a component without a broker.
#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use mqtt_component::{
	AdapterError, AdapterEvent, ComponentSignal, ConnectAck, ConnectionAdapter,
	Connector, InboundMessage, QoS, SubscriptionGrant,
};
use tokio::sync::{broadcast, mpsc};

/// Operation recorded by a [`MockAdapter`].
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	Subscribe(Vec<(String, QoS)>),
	Unsubscribe(Vec<String>),
	Publish {
		topic: String,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	},
	End {
		force: bool,
	},
}

/// What the connector does right after opening a connection.
#[derive(Debug, Clone)]
pub enum OnConnect {
	Accept { session_present: bool },
	Fail(String),
	Close,
	Nothing,
}

#[derive(Default)]
pub struct MockAdapter {
	connected: AtomicBool,
	fail_subscribe: AtomicBool,
	subscribe_delay: Mutex<Option<(String, Duration)>>,
	calls: Mutex<Vec<Call>>,
}

impl MockAdapter {
	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn subscriptions(&self) -> Vec<(String, QoS)> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				| Call::Subscribe(filters) => Some(filters),
				| _ => None,
			})
			.flatten()
			.collect()
	}

	pub fn subscribed_filters(&self) -> Vec<String> {
		let mut filters: Vec<String> =
			self.subscriptions().into_iter().map(|(f, _)| f).collect();
		filters.sort();
		filters
	}

	pub fn unsubscriptions(&self) -> Vec<String> {
		self.calls()
			.into_iter()
			.filter_map(|call| match call {
				| Call::Unsubscribe(filters) => Some(filters),
				| _ => None,
			})
			.flatten()
			.collect()
	}

	pub fn publishes(&self) -> Vec<Call> {
		self.calls()
			.into_iter()
			.filter(|call| matches!(call, Call::Publish { .. }))
			.collect()
	}

	pub fn clear(&self) {
		self.calls.lock().unwrap().clear();
	}

	pub fn set_connected(&self, connected: bool) {
		self.connected.store(connected, Ordering::SeqCst);
	}

	pub fn fail_subscriptions(&self, fail: bool) {
		self.fail_subscribe.store(fail, Ordering::SeqCst);
	}

	/// Makes subscriptions that include `filter` take `delay` to complete.
	pub fn delay_subscription(&self, filter: &str, delay: Duration) {
		*self.subscribe_delay.lock().unwrap() = Some((filter.to_string(), delay));
	}

	fn record(&self, call: Call) {
		self.calls.lock().unwrap().push(call);
	}
}

#[async_trait]
impl ConnectionAdapter for MockAdapter {
	async fn subscribe(
		&self,
		filters: Vec<(String, QoS)>,
	) -> Result<Vec<SubscriptionGrant>, AdapterError> {
		if self.fail_subscribe.load(Ordering::SeqCst) {
			return Err(AdapterError::Other("subscription refused".into()));
		}
		let delay = self
			.subscribe_delay
			.lock()
			.unwrap()
			.clone()
			.filter(|(slow, _)| filters.iter().any(|(f, _)| f == slow));
		if let Some((_, delay)) = delay {
			tokio::time::sleep(delay).await;
		}
		self.record(Call::Subscribe(filters.clone()));
		Ok(filters
			.into_iter()
			.map(|(filter, qos)| SubscriptionGrant { filter, qos })
			.collect())
	}

	async fn unsubscribe(
		&self,
		filters: Vec<String>,
	) -> Result<(), AdapterError> {
		self.record(Call::Unsubscribe(filters));
		Ok(())
	}

	async fn publish(
		&self,
		topic: String,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	) -> Result<(), AdapterError> {
		self.record(Call::Publish {
			topic,
			payload,
			qos,
			retain,
		});
		Ok(())
	}

	async fn end(&self, force: bool) -> Result<(), AdapterError> {
		self.set_connected(false);
		self.record(Call::End { force });
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}
}

struct BrokerState {
	on_connect: OnConnect,
	adapters: Vec<Arc<MockAdapter>>,
	events: Option<mpsc::Sender<AdapterEvent>>,
}

/// Test side of the mock connection: inspects adapters and injects events.
#[derive(Clone)]
pub struct MockBroker {
	state: Arc<Mutex<BrokerState>>,
	connects: Arc<AtomicUsize>,
	flushes: Arc<AtomicUsize>,
}

impl MockBroker {
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(BrokerState {
				on_connect: OnConnect::Accept {
					session_present: false,
				},
				adapters: Vec::new(),
				events: None,
			})),
			connects: Arc::new(AtomicUsize::new(0)),
			flushes: Arc::new(AtomicUsize::new(0)),
		}
	}

	pub fn on_connect(&self, behavior: OnConnect) {
		self.state.lock().unwrap().on_connect = behavior;
	}

	pub fn connector(&self) -> MockConnector {
		MockConnector {
			broker: self.clone(),
		}
	}

	pub fn connect_count(&self) -> usize {
		self.connects.load(Ordering::SeqCst)
	}

	/// Adapter of the latest connection.
	pub fn adapter(&self) -> Arc<MockAdapter> {
		self.state
			.lock()
			.unwrap()
			.adapters
			.last()
			.cloned()
			.expect("no connection opened")
	}

	pub async fn send(&self, event: AdapterEvent) {
		let events = self
			.state
			.lock()
			.unwrap()
			.events
			.clone()
			.expect("no connection opened");
		events.send(event).await.expect("dispatcher dropped events");
	}

	pub async fn deliver(&self, topic: &str, payload: impl Into<Bytes>) {
		self.send(AdapterEvent::Message(InboundMessage::new(
			topic.to_string(),
			payload,
		)))
		.await;
	}

	/// Simulates a reconnect of the current adapter.
	pub async fn reconnect(&self, session_present: bool) {
		let adapter = self.adapter();
		adapter.set_connected(false);
		self.send(AdapterEvent::Offline).await;
		self.send(AdapterEvent::Reconnect).await;
		adapter.set_connected(true);
		self.send(AdapterEvent::Connect(ConnectAck { session_present }))
			.await;
	}

	/// Waits until every event sent so far has been processed by the
	/// dispatcher, using an unmatched message as a marker.
	pub async fn flush(&self, signals: &mut broadcast::Receiver<ComponentSignal>) {
		let n = self.flushes.fetch_add(1, Ordering::SeqCst);
		let marker = format!("flush/marker/{n}");
		self.deliver(&marker, Bytes::new()).await;
		tokio::time::timeout(Duration::from_secs(30), async {
			loop {
				match signals.recv().await {
					| Ok(ComponentSignal::Unmatched(m)) if m.topic == marker => {
						return;
					}
					| Ok(_) => {}
					| Err(broadcast::error::RecvError::Lagged(_)) => {}
					| Err(e) => panic!("signal channel closed: {e}"),
				}
			}
		})
		.await
		.expect("flush marker not observed");
	}
}

pub struct MockConnector {
	broker: MockBroker,
}

#[async_trait]
impl Connector for MockConnector {
	async fn connect(
		&self,
	) -> Result<(Arc<dyn ConnectionAdapter>, mpsc::Receiver<AdapterEvent>), AdapterError>
	{
		self.broker.connects.fetch_add(1, Ordering::SeqCst);
		let adapter = Arc::new(MockAdapter::default());
		let (tx, rx) = mpsc::channel(64);

		let mut state = self.broker.state.lock().unwrap();
		match state.on_connect.clone() {
			| OnConnect::Accept { session_present } => {
				adapter.set_connected(true);
				let _ = tx.try_send(AdapterEvent::Connect(ConnectAck {
					session_present,
				}));
			}
			| OnConnect::Fail(reason) => {
				let _ = tx.try_send(AdapterEvent::Error(AdapterError::Other(reason)));
			}
			| OnConnect::Close => {
				let _ = tx.try_send(AdapterEvent::Close);
			}
			| OnConnect::Nothing => {}
		}
		state.adapters.push(adapter.clone());
		state.events = Some(tx);
		let adapter: Arc<dyn ConnectionAdapter> = adapter;
		Ok((adapter, rx))
	}
}

/// Collects the signals already queued on `signals`.
pub fn drain(signals: &mut broadcast::Receiver<ComponentSignal>) -> Vec<ComponentSignal> {
	let mut out = Vec::new();
	loop {
		match signals.try_recv() {
			| Ok(signal) => out.push(signal),
			| Err(broadcast::error::TryRecvError::Lagged(_)) => {}
			| Err(_) => return out,
		}
	}
}

pub fn count_ready(signals: &[ComponentSignal]) -> usize {
	signals
		.iter()
		.filter(|s| matches!(s, ComponentSignal::Ready))
		.count()
}

pub fn count_timeout(signals: &[ComponentSignal]) -> usize {
	signals
		.iter()
		.filter(|s| matches!(s, ComponentSignal::Timeout))
		.count()
}
