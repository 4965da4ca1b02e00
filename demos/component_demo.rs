//! # Thermostat component
//!
//! Connects to the broker from `MQTT_BROKER`, waits for its `interval`
//! setting on `sys/thermostat/interval` and reports readings of every room.
//!
//! Try it with a local broker:
//! ```bash
//! mosquitto_pub -r -t sys/thermostat/interval -m 5
//! mosquitto_pub -t sensors/kitchen/temperature -m 21.5
//! RUST_LOG=info cargo run --example component_demo
//! ```

#[path = "shared/config.rs"]
mod config;
#[path = "shared/tracing.rs"]
mod tracing_setup;

use std::time::Duration;

use mqtt_component::prelude::*;
use serde::Serialize;
use serde_json::json;

const COMPONENT_ID: &str = "thermostat";

#[derive(Serialize)]
struct Reading<'a> {
	room: &'a str,
	celsius: f64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
	tracing_setup::setup();

	let settings = ComponentSettings::default()
		.with_required_settings(["interval"])
		.with_settings_timeout(Some(Duration::from_secs(5)));
	let component_config =
		ComponentConfig::from_url(COMPONENT_ID, &config::broker_url())?
			.with_settings(settings);
	let component = Component::new(COMPONENT_ID, component_config)?;

	component
		.route("sensors/{room}/temperature", |message, ctx| {
			let Some(room) = message.param("room").map(str::to_string) else {
				return;
			};
			let Some(celsius) = message
				.payload()
				.as_structured()
				.and_then(|value| value.as_f64())
			else {
				println!("Ignoring non-numeric reading from {room}");
				return;
			};
			let ctx = ctx.clone();
			tokio::spawn(async move {
				let reading = Reading {
					room: &room,
					celsius,
				};
				if let Err(e) = ctx
					.publish_json(
						"{$componentId}/readings",
						&reading,
						PublishOptions::default(),
					)
					.await
				{
					eprintln!("Failed to publish reading: {e}");
				}
			});
		})
		.await?;

	component
		.route_with_options(
			"{$componentId}/shutdown",
			|_, _| println!("Shutdown requested"),
			RouteOptions::default().with_once(true),
		)
		.await?;

	let mut signals = component.signals();
	component.start().await?;
	println!("Connected as {}", component.component_id());

	match component.wait_ready().await {
		| Ok(()) => println!("Ready, interval = {:?}", component.get("interval")),
		| Err(ComponentError::ReadinessTimedOut) => {
			println!("No interval received, using default");
			component.set("interval", json!(10), false);
		}
		| Err(e) => return Err(e.into()),
	}
	component.set_local("started", json!(true), true).await?;

	loop {
		tokio::select! {
			signal = signals.recv() => match signal {
				| Ok(ComponentSignal::Unmatched(message)) => {
					println!("Unrouted message on {}", message.topic);
				}
				| Ok(ComponentSignal::Closed) | Err(_) => break,
				| Ok(other) => println!("Signal: {other:?}"),
			},
			_ = tokio::signal::ctrl_c() => break,
		}
	}

	component.stop(false).await?;
	Ok(())
}
