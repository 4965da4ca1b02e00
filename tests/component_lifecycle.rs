//! Start/stop, reconnects, outbound operations and settings access.

mod support;

use bytes::Bytes;
use mqtt_component::{
	AdapterError, AdapterEvent, Component, ComponentError, ComponentSignal,
	Payload, PublishOptions, QoS, ReadinessState, SubscribeOptions,
};
use serde_json::json;
use support::{drain, Call, MockBroker, OnConnect};

fn component(broker: &MockBroker) -> Component {
	Component::builder("comp1")
		.connector(broker.connector())
		.build()
		.unwrap()
}

#[tokio::test]
async fn test_start_subscribes_routes_and_becomes_ready() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	component.route("{$componentId}/status", |_, _| {}).await.unwrap();
	component.route("a/+/c", |_, _| {}).await.unwrap();

	let ack = component.start().await.unwrap();

	assert!(!ack.session_present);
	assert!(component.is_connected());
	assert_eq!(
		broker.adapter().subscribed_filters(),
		vec!["a/+/c".to_string(), "comp1/status".to_string()]
	);
	assert_eq!(component.readiness(), ReadinessState::Ready);
	component.wait_ready().await.unwrap();

	let signals = drain(&mut signals);
	assert!(matches!(signals[0], ComponentSignal::Connected(_)));
	assert_eq!(support::count_ready(&signals), 1);
}

#[tokio::test]
async fn test_build_rejects_unusable_setting_names() {
	let broker = MockBroker::new();
	for bad in ["", "a/b", "+", "#"] {
		let built = Component::builder("comp1")
			.required_settings(["ok", bad])
			.connector(broker.connector())
			.build();
		assert!(
			matches!(built, Err(ComponentError::ConfigurationValue(_))),
			"accepted {bad:?}"
		);
	}
	assert_eq!(broker.connect_count(), 0);
}

#[tokio::test]
async fn test_start_twice_fails() {
	let broker = MockBroker::new();
	let component = component(&broker);
	component.start().await.unwrap();

	let err = component.start().await.unwrap_err();
	assert!(matches!(err, ComponentError::AlreadyStarted));
	assert_eq!(broker.connect_count(), 1);
}

#[tokio::test]
async fn test_connect_error_rejects_start() {
	let broker = MockBroker::new();
	broker.on_connect(OnConnect::Fail("refused".into()));
	let component = component(&broker);

	let err = component.start().await.unwrap_err();
	assert!(matches!(err, ComponentError::Adapter(AdapterError::Other(ref r)) if r == "refused"));
	assert_eq!(broker.adapter().calls(), vec![Call::End { force: true }]);
	assert!(!component.is_connected());

	// The failed attempt leaves the component stopped.
	broker.on_connect(OnConnect::Accept {
		session_present: false,
	});
	component.start().await.unwrap();
	assert_eq!(broker.connect_count(), 2);
}

#[tokio::test]
async fn test_close_before_connect_rejects_start() {
	let broker = MockBroker::new();
	broker.on_connect(OnConnect::Close);
	let component = component(&broker);

	let err = component.start().await.unwrap_err();
	assert!(matches!(err, ComponentError::ConnectionClosed));
}

#[tokio::test]
async fn test_stop() {
	let broker = MockBroker::new();
	let component = component(&broker);

	let err = component.stop(false).await.unwrap_err();
	assert!(matches!(err, ComponentError::NotConnected));

	component.start().await.unwrap();
	let mut signals = component.signals();
	component.stop(false).await.unwrap();

	assert!(!component.is_connected());
	assert!(broker.adapter().calls().contains(&Call::End { force: false }));
	assert!(matches!(
		drain(&mut signals).as_slice(),
		[ComponentSignal::Closed]
	));
	let err = component
		.publish("x", "y", PublishOptions::default())
		.await
		.unwrap_err();
	assert!(matches!(err, ComponentError::NotConnected));

	component.start().await.unwrap();
	assert_eq!(broker.connect_count(), 2);
}

#[tokio::test]
async fn test_operations_require_connection() {
	let broker = MockBroker::new();
	let component = component(&broker);

	let err = component
		.publish("t", "x", PublishOptions::default())
		.await
		.unwrap_err();
	assert!(matches!(err, ComponentError::NotConnected));
	assert_eq!(broker.connect_count(), 0);

	component.start().await.unwrap();
	let adapter = broker.adapter();
	adapter.clear();
	adapter.set_connected(false);

	assert!(matches!(
		component.publish("t", "x", PublishOptions::default()).await,
		Err(ComponentError::NotConnected)
	));
	assert!(matches!(
		component.subscribe("t", SubscribeOptions::default()).await,
		Err(ComponentError::NotConnected)
	));
	assert!(matches!(
		component.unsubscribe("t").await,
		Err(ComponentError::NotConnected)
	));
	assert!(adapter.calls().is_empty());
}

#[tokio::test]
async fn test_placeholder_substitution_on_outbound_operations() {
	let broker = MockBroker::new();
	let component = component(&broker);
	component.start().await.unwrap();
	let adapter = broker.adapter();
	adapter.clear();

	let grants = component
		.subscribe("{$componentId}/cmd", SubscribeOptions {
			qos: QoS::AtLeastOnce,
		})
		.await
		.unwrap();
	assert_eq!(grants[0].filter, "comp1/cmd");
	assert_eq!(grants[0].qos, QoS::AtLeastOnce);

	component
		.publish("{$componentId}/status", "on", PublishOptions::default())
		.await
		.unwrap();
	component
		.publish_json(
			"devices/{$componentId}",
			&json!({"state": "on"}),
			PublishOptions::default().with_qos(QoS::AtLeastOnce),
		)
		.await
		.unwrap();
	component.unsubscribe("{$componentId}/cmd").await.unwrap();

	assert_eq!(adapter.calls(), vec![
		Call::Subscribe(vec![("comp1/cmd".to_string(), QoS::AtLeastOnce)]),
		Call::Publish {
			topic: "comp1/status".to_string(),
			payload: Bytes::from_static(b"on"),
			qos: QoS::AtMostOnce,
			retain: false,
		},
		Call::Publish {
			topic: "devices/comp1".to_string(),
			payload: Bytes::from_static(b"{\"state\":\"on\"}"),
			qos: QoS::AtLeastOnce,
			retain: false,
		},
		Call::Unsubscribe(vec!["comp1/cmd".to_string()]),
	]);
}

#[tokio::test]
async fn test_publish_rejects_wildcard_topic() {
	let broker = MockBroker::new();
	let component = component(&broker);
	component.start().await.unwrap();

	let err = component
		.publish("a/+/c", "x", PublishOptions::default())
		.await
		.unwrap_err();
	assert!(matches!(err, ComponentError::InvalidTopic(_)));
}

#[tokio::test]
async fn test_resubscribes_when_session_not_resumed() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	component.route("a/+/c", |_, _| {}).await.unwrap();
	component.start().await.unwrap();
	let adapter = broker.adapter();

	adapter.clear();
	broker.reconnect(true).await;
	broker.flush(&mut signals).await;
	assert!(adapter.subscriptions().is_empty());

	broker.reconnect(false).await;
	broker.flush(&mut signals).await;
	assert_eq!(adapter.subscribed_filters(), vec!["a/+/c".to_string()]);
}

#[tokio::test]
async fn test_lifecycle_signals_after_start() {
	let broker = MockBroker::new();
	let component = component(&broker);
	component.start().await.unwrap();
	let mut signals = component.signals();

	broker.reconnect(true).await;
	broker
		.send(AdapterEvent::Error(AdapterError::Other("flaky".into())))
		.await;
	broker.send(AdapterEvent::Close).await;

	let mut seen = Vec::new();
	while seen.len() < 5 {
		seen.push(signals.recv().await.unwrap());
	}
	assert!(matches!(seen[0], ComponentSignal::Offline));
	assert!(matches!(seen[1], ComponentSignal::Reconnecting));
	assert!(matches!(
		seen[2],
		ComponentSignal::Connected(ack) if ack.session_present
	));
	assert!(matches!(&seen[3], ComponentSignal::Error(e) if e.to_string() == "flaky"));
	assert!(matches!(seen[4], ComponentSignal::Closed));
}

#[tokio::test]
async fn test_set_local_propagates_retained() {
	let broker = MockBroker::new();
	let component = component(&broker);

	let err = component
		.set_local("interval", json!(5), true)
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		ComponentError::PropagationWithoutConnection { ref property } if property == "interval"
	));
	assert_eq!(component.get("interval"), Some(Payload::from(json!(5))));

	component.start().await.unwrap();
	let adapter = broker.adapter();
	adapter.clear();
	component
		.set_local("interval", json!(7), true)
		.await
		.unwrap();
	component.set_local("mode", "eco", false).await.unwrap();

	assert_eq!(adapter.calls(), vec![Call::Publish {
		topic: "sys/comp1/interval".to_string(),
		payload: Bytes::from_static(b"7"),
		qos: QoS::AtMostOnce,
		retain: true,
	}]);
	assert_eq!(component.get("interval"), Some(Payload::from(json!(7))));
	assert_eq!(component.get("mode"), Some(Payload::from("eco")));
}

#[tokio::test]
async fn test_store_access() {
	let broker = MockBroker::new();
	let component = component(&broker);

	assert_eq!(component.get("missing"), None);
	assert_eq!(component.get_or("missing", json!(1)), Payload::from(json!(1)));

	component.set("k", json!("a"), false);
	component.set("k", json!("b"), false);
	assert_eq!(component.get("k"), Some(Payload::from(json!("a"))));
	component.set("k", json!("b"), true);
	assert_eq!(component.get("k"), Some(Payload::from(json!("b"))));
}

#[tokio::test]
async fn test_dropped_handles_stop_connection() {
	let broker = MockBroker::new();
	let component = component(&broker);
	component.start().await.unwrap();
	let adapter = broker.adapter();
	let context = component.context();

	drop(component);
	for _ in 0 .. 100 {
		if !adapter.calls().is_empty() {
			break;
		}
		tokio::task::yield_now().await;
	}
	assert_eq!(adapter.calls(), vec![Call::End { force: true }]);
	assert!(!context.is_connected());
}
