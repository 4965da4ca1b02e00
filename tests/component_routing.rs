//! Inbound dispatch and route management through a mock connection.

mod support;

use mqtt_component::{
	Component, ComponentError, ComponentSignal, Payload, QoS, RouteOptions,
};
use serde_json::json;
use support::MockBroker;
use tokio::sync::mpsc;

fn component(broker: &MockBroker) -> Component {
	Component::builder("comp1")
		.connector(broker.connector())
		.build()
		.unwrap()
}

fn received(rx: &mut mpsc::UnboundedReceiver<String>) -> Vec<String> {
	let mut out = Vec::new();
	while let Ok(item) = rx.try_recv() {
		out.push(item);
	}
	out
}

#[tokio::test]
async fn test_first_declared_route_wins() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	let (tx, mut rx) = mpsc::unbounded_channel();

	let r1 = tx.clone();
	component
		.route("a/#", move |message, _| {
			r1.send(format!("R1 {}", message.topic())).unwrap();
		})
		.await
		.unwrap();
	let r2 = tx.clone();
	component
		.route("a/b/c", move |message, _| {
			r2.send(format!("R2 {}", message.topic())).unwrap();
		})
		.await
		.unwrap();

	component.start().await.unwrap();
	broker.deliver("a/b/c", "x").await;
	broker.flush(&mut signals).await;

	assert_eq!(received(&mut rx), vec!["R1 a/b/c".to_string()]);
}

#[tokio::test]
async fn test_named_parameters_reach_handler() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	let (tx, mut rx) = mpsc::unbounded_channel();

	component
		.route("test/some/{topic}", move |message, ctx| {
			let payload = message.payload();
			tx.send(format!(
				"{}:{}:{}",
				ctx.component_id(),
				message.param("topic").unwrap_or("-"),
				payload.as_structured().unwrap()["n"]
			))
			.unwrap();
		})
		.await
		.unwrap();

	component.start().await.unwrap();
	broker.deliver("test/some/foo", &b"{\"n\":1}"[..]).await;
	broker.deliver("test/some/foo/bar", "ignored").await;
	broker.flush(&mut signals).await;

	assert_eq!(received(&mut rx), vec!["comp1:foo:1".to_string()]);
}

#[tokio::test]
async fn test_unmatched_message_is_signalled() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	component.start().await.unwrap();

	broker.deliver("nothing/here", "x").await;
	loop {
		match signals.recv().await.unwrap() {
			| ComponentSignal::Unmatched(message) => {
				assert_eq!(message.topic.as_str(), "nothing/here");
				assert_eq!(&message.payload[..], b"x");
				break;
			}
			| ComponentSignal::Connected(_) | ComponentSignal::Ready => {}
			| other => panic!("unexpected signal {other:?}"),
		}
	}
}

#[tokio::test]
async fn test_one_shot_route_fires_once_and_unsubscribes() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	let (tx, mut rx) = mpsc::unbounded_channel();

	component
		.route_with_options(
			"{$componentId}/reply",
			move |message, _| {
				tx.send(message.topic().to_string()).unwrap();
			},
			RouteOptions::default().with_once(true),
		)
		.await
		.unwrap();
	component.start().await.unwrap();

	broker.deliver("comp1/reply", "1").await;
	broker.deliver("comp1/reply", "2").await;
	broker.flush(&mut signals).await;

	assert_eq!(received(&mut rx), vec!["comp1/reply".to_string()]);
	assert_eq!(broker.adapter().unsubscriptions(), vec!["comp1/reply"]);
}

#[tokio::test]
async fn test_one_shot_keeps_filter_shared_with_other_route() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	let (tx, mut rx) = mpsc::unbounded_channel();

	let once_tx = tx.clone();
	component
		.route_with_options(
			"jobs/{id}",
			move |message, _| {
				once_tx
					.send(format!("once {}", message.param("id").unwrap()))
					.unwrap();
			},
			RouteOptions::default().with_once(true),
		)
		.await
		.unwrap();
	component
		.route("jobs/+", move |message, _| {
			tx.send(format!("always {}", message.topic())).unwrap();
		})
		.await
		.unwrap();
	component.start().await.unwrap();

	broker.deliver("jobs/7", "").await;
	broker.deliver("jobs/8", "").await;
	broker.flush(&mut signals).await;

	assert_eq!(
		received(&mut rx),
		vec!["once 7".to_string(), "always jobs/8".to_string()]
	);
	assert!(broker.adapter().unsubscriptions().is_empty());
}

#[tokio::test]
async fn test_duplicate_and_invalid_routes_rejected() {
	let broker = MockBroker::new();
	let component = component(&broker);

	component.route("{$componentId}/cmd", |_, _| {}).await.unwrap();
	let err = component.route("comp1/cmd", |_, _| {}).await.unwrap_err();
	assert!(matches!(err, ComponentError::DuplicateRoute { ref topic } if topic == "comp1/cmd"));

	let err = component.route("a/#/b", |_, _| {}).await.unwrap_err();
	assert!(matches!(err, ComponentError::InvalidPattern(_)));

	// Same filter, different template.
	component.route("comp1/+", |_, _| {}).await.unwrap();
}

#[tokio::test]
async fn test_route_declared_while_connected_subscribes_immediately() {
	let broker = MockBroker::new();
	let component = component(&broker);
	component.start().await.unwrap();
	let adapter = broker.adapter();
	adapter.clear();

	component
		.route_with_options(
			"late/{x}",
			|_, _| {},
			RouteOptions::default().with_qos(QoS::AtLeastOnce),
		)
		.await
		.unwrap();
	assert_eq!(
		adapter.subscriptions(),
		vec![("late/+".to_string(), QoS::AtLeastOnce)]
	);

	component
		.route_with_options(
			"local/only",
			|_, _| {},
			RouteOptions::default().with_subscribe(false),
		)
		.await
		.unwrap();
	assert_eq!(adapter.subscriptions().len(), 1);
}

#[tokio::test]
async fn test_failed_immediate_subscription_removes_route() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	let (tx, mut rx) = mpsc::unbounded_channel();
	component.start().await.unwrap();
	broker.adapter().fail_subscriptions(true);

	let err = component
		.route("late/topic", move |m, _| {
			tx.send(m.topic().to_string()).unwrap();
		})
		.await
		.unwrap_err();
	assert!(matches!(err, ComponentError::Adapter(_)));

	broker.deliver("late/topic", "x").await;
	broker.flush(&mut signals).await;
	assert!(received(&mut rx).is_empty());

	// The topic is free to be declared again.
	broker.adapter().fail_subscriptions(false);
	component.route("late/topic", |_, _| {}).await.unwrap();
}

#[tokio::test]
async fn test_unroute_releases_subscription() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let id = component.route("a/+/c", |_, _| {}).await.unwrap();
	component.start().await.unwrap();

	component.unroute(id).await.unwrap();
	assert_eq!(broker.adapter().unsubscriptions(), vec!["a/+/c"]);

	let err = component.unroute(id).await.unwrap_err();
	assert!(matches!(err, ComponentError::RouteNotFound(missing) if missing == id));
}

#[tokio::test]
async fn test_settings_messages_bypass_routes() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	let (tx, mut rx) = mpsc::unbounded_channel();

	component
		.route("sys/+/+", move |m, _| {
			tx.send(m.topic().to_string()).unwrap();
		})
		.await
		.unwrap();
	component.start().await.unwrap();

	broker.deliver("sys/comp1/interval", "5").await;
	broker.deliver("sys/other/interval", "6").await;
	broker.flush(&mut signals).await;

	assert_eq!(received(&mut rx), vec!["sys/other/interval".to_string()]);
	assert_eq!(component.get("interval"), Some(Payload::from(json!(5))));
}

#[tokio::test]
async fn test_handler_context_publishes() {
	let broker = MockBroker::new();
	let component = component(&broker);
	let mut signals = component.signals();
	let (tx, mut rx) = mpsc::unbounded_channel();

	component
		.route("{$componentId}/ping", move |_, ctx| {
			let ctx = ctx.clone();
			let tx = tx.clone();
			tokio::spawn(async move {
				let result = ctx
					.publish("{$componentId}/pong", "1", Default::default())
					.await;
				tx.send(format!("{result:?}")).unwrap();
			});
		})
		.await
		.unwrap();
	component.start().await.unwrap();
	broker.deliver("comp1/ping", "").await;
	broker.flush(&mut signals).await;

	let outcome = rx.recv().await.unwrap();
	assert_eq!(outcome, "Ok(())");
	assert_eq!(broker.adapter().publishes().len(), 1);
}
