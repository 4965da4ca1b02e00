//! [`Connector`] backed by `rumqttc`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use arcstr::ArcStr;
use async_trait::async_trait;
use bytes::Bytes;
use rumqttc::Packet::{ConnAck, Disconnect, Publish};
use rumqttc::{
	AsyncClient, ConnectReturnCode, EventLoop, MqttOptions, QoS,
	SubscribeFilter,
};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tracing::{debug, error, info, warn};

use super::adapter::{
	AdapterError, AdapterEvent, AdapterEvents, ConnectAck, ConnectionAdapter,
	Connector, InboundMessage, SubscriptionGrant,
};

const MAX_CONSECUTIVE_ERRORS: u32 = 10;
const INITIAL_RETRY_DELAY: Duration = Duration::from_millis(100);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(30);

/// Opens connections with a fresh `AsyncClient` and event loop per attempt.
#[derive(Debug, Clone)]
pub struct RumqttcConnector {
	options: MqttOptions,
	request_capacity: usize,
	event_capacity: usize,
}

impl RumqttcConnector {
	pub fn new(
		options: MqttOptions,
		request_capacity: usize,
		event_capacity: usize,
	) -> Self {
		Self {
			options,
			request_capacity,
			event_capacity,
		}
	}

	pub fn options(&self) -> &MqttOptions {
		&self.options
	}
}

#[async_trait]
impl Connector for RumqttcConnector {
	async fn connect(
		&self,
	) -> Result<(Arc<dyn ConnectionAdapter>, AdapterEvents), AdapterError> {
		let (client, event_loop) =
			AsyncClient::new(self.options.clone(), self.request_capacity);
		let (events_tx, events_rx) = mpsc::channel(self.event_capacity);
		let connected = Arc::new(AtomicBool::new(false));

		let (host, port) = self.options.broker_address();
		info!(host = %host, port = port, client_id = %self.options.client_id(), "Opening MQTT connection");

		let pump = tokio::spawn(pump(event_loop, events_tx, connected.clone()));
		let adapter: Arc<dyn ConnectionAdapter> = Arc::new(RumqttcAdapter {
			client,
			connected,
			pump: Mutex::new(Some(pump)),
		});
		Ok((adapter, events_rx))
	}
}

/// Adapter over an `AsyncClient` whose event loop runs in a pump task.
pub struct RumqttcAdapter {
	client: AsyncClient,
	connected: Arc<AtomicBool>,
	pump: Mutex<Option<JoinHandle<()>>>,
}

impl RumqttcAdapter {
	fn take_pump(&self) -> Option<JoinHandle<()>> {
		self.pump
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take()
	}
}

#[async_trait]
impl ConnectionAdapter for RumqttcAdapter {
	async fn subscribe(
		&self,
		filters: Vec<(String, QoS)>,
	) -> Result<Vec<SubscriptionGrant>, AdapterError> {
		// SUBACK codes are not surfaced by the client, so the requested QoS
		// is reported back as granted.
		let grants = filters
			.iter()
			.map(|(filter, qos)| SubscriptionGrant {
				filter: filter.clone(),
				qos: *qos,
			})
			.collect();
		match filters.len() {
			| 0 => {}
			| 1 => {
				let (filter, qos) = filters
					.into_iter()
					.next()
					.ok_or(AdapterError::Closed)?;
				self.client.subscribe(filter, qos).await?;
			}
			| _ => {
				self.client
					.subscribe_many(
						filters
							.into_iter()
							.map(|(filter, qos)| SubscribeFilter::new(filter, qos)),
					)
					.await?;
			}
		}
		Ok(grants)
	}

	async fn unsubscribe(
		&self,
		filters: Vec<String>,
	) -> Result<(), AdapterError> {
		for filter in filters {
			self.client.unsubscribe(filter).await?;
		}
		Ok(())
	}

	async fn publish(
		&self,
		topic: String,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	) -> Result<(), AdapterError> {
		self.client
			.publish(topic, qos, retain, payload.to_vec())
			.await?;
		Ok(())
	}

	async fn end(&self, force: bool) -> Result<(), AdapterError> {
		self.connected.store(false, Ordering::SeqCst);
		let Some(handle) = self.take_pump() else {
			return Ok(());
		};
		if force {
			handle.abort();
			return Ok(());
		}
		// The pump exits once the outgoing Disconnect is observed.
		if let Err(e) = self.client.disconnect().await {
			warn!(error = %e, "Failed to disconnect MQTT client");
			handle.abort();
			return Err(e.into());
		}
		if let Err(e) = handle.await {
			if !e.is_cancelled() {
				warn!(error = %e, "Event loop task failed");
			}
		}
		Ok(())
	}

	fn is_connected(&self) -> bool {
		self.connected.load(Ordering::SeqCst)
	}
}

impl Drop for RumqttcAdapter {
	fn drop(&mut self) {
		if let Some(handle) = self.take_pump() {
			debug!("Adapter dropped without end(), aborting event loop");
			handle.abort();
		}
	}
}

/// Drives the rumqttc event loop and translates notifications into
/// adapter events. Terminates on Disconnect, on a failed first connection,
/// after too many consecutive errors or when the receiver goes away.
async fn pump(
	mut event_loop: EventLoop,
	events: mpsc::Sender<AdapterEvent>,
	connected: Arc<AtomicBool>,
) {
	let mut error_count = 0;
	let mut ever_connected = false;

	loop {
		let event = match event_loop.poll().await {
			| Ok(Incoming(ConnAck(ack))) => {
				if ack.code == ConnectReturnCode::Success {
					error_count = 0;
					ever_connected = true;
					connected.store(true, Ordering::SeqCst);
					info!(session_present = ack.session_present, "Connected to MQTT broker");
					AdapterEvent::Connect(ConnectAck {
						session_present: ack.session_present,
					})
				} else {
					connected.store(false, Ordering::SeqCst);
					error!(code = ?ack.code, "Broker rejected connection");
					let rejected = AdapterEvent::Error(
						AdapterError::BrokerRejected { code: ack.code },
					);
					if !ever_connected {
						let _ = events.send(rejected).await;
						break;
					}
					rejected
				}
			}
			| Ok(Incoming(Publish(p))) => {
				error_count = 0;
				debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
				AdapterEvent::Message(InboundMessage {
					topic: ArcStr::from(p.topic),
					payload: p.payload,
					qos: p.qos,
					retain: p.retain,
					dup: p.dup,
				})
			}
			| Ok(Incoming(Disconnect)) => {
				info!("Received MQTT Disconnect packet from server");
				connected.store(false, Ordering::SeqCst);
				let _ = events.send(AdapterEvent::Close).await;
				break;
			}
			| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
				info!("Sent MQTT Disconnect packet to server");
				connected.store(false, Ordering::SeqCst);
				let _ = events.send(AdapterEvent::Close).await;
				break;
			}
			| Ok(notification) => {
				error_count = 0;
				debug!(notification = ?notification, "Received MQTT notification");
				continue;
			}
			| Err(err) => {
				let was_connected = connected.swap(false, Ordering::SeqCst);
				if !ever_connected {
					error!(error = %err, "MQTT connection failed");
					let _ = events
						.send(AdapterEvent::Error(AdapterError::Network(err)))
						.await;
					break;
				}

				error_count += 1;
				error!(error_count = error_count, error = %err, "MQTT event loop error");
				if was_connected
					&& events.send(AdapterEvent::Offline).await.is_err()
				{
					break;
				}
				if events
					.send(AdapterEvent::Error(AdapterError::Network(err)))
					.await
					.is_err()
				{
					break;
				}

				if error_count >= MAX_CONSECUTIVE_ERRORS {
					error!(
						error_count = error_count,
						max_errors = MAX_CONSECUTIVE_ERRORS,
						"Too many consecutive errors, terminating event loop"
					);
					let _ = events.send(AdapterEvent::Close).await;
					break;
				}

				let delay = retry_delay(error_count);
				warn!(delay = ?delay, error_count = error_count, "Retrying MQTT connection");
				time::sleep(delay).await;
				AdapterEvent::Reconnect
			}
		};

		if events.send(event).await.is_err() {
			debug!("Event receiver dropped, stopping event loop");
			break;
		}
	}
	connected.store(false, Ordering::SeqCst);
	info!("MQTT event loop terminated");
}

fn retry_delay(error_count: u32) -> Duration {
	let delay =
		INITIAL_RETRY_DELAY * 2_u32.pow(error_count.saturating_sub(1).min(10));
	delay.min(MAX_RETRY_DELAY)
}
