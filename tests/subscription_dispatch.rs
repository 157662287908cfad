//! Subscribing, wildcard dispatch and unsubscribing

mod common;

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use bytes::Bytes;
use common::*;
use mqtt_session::errors::{TopicError, TopicFilterError};
use mqtt_session::{Handler, QoS, SessionError, SessionEvent};

#[tokio::test]
async fn test_wildcard_subscription_round_trip() {
	let stub = StubTransport::new();
	let session = connected(&stub, config()).await;
	let (handler, mut rx) = recording_handler();

	session
		.subscribe(["sensors/#"], handler, QoS::AtLeastOnce)
		.await
		.unwrap();
	assert_eq!(stub.subscribe_calls(), vec![vec![(
		"sensors/#".to_string(),
		QoS::AtLeastOnce
	)]]);

	stub.deliver("sensors/kitchen/temp", b"21.5").await;
	stub.deliver("sensors", b"root").await;
	stub.deliver("actuators/fan", b"on").await;
	stub.deliver("sensors/hall", b"19").await;

	assert_eq!(
		next_message(&mut rx).await,
		(
			"sensors/kitchen/temp".to_string(),
			Bytes::from_static(b"21.5")
		)
	);
	assert_eq!(next_message(&mut rx).await.0, "sensors");
	// The non-matching topic was skipped
	assert_eq!(next_message(&mut rx).await.0, "sensors/hall");
	session.disconnect().await.unwrap();
}

fn counting_handler() -> (Handler, Arc<AtomicUsize>) {
	let calls = Arc::new(AtomicUsize::new(0));
	let counter = calls.clone();
	let handler = Handler::from_fn(move |_, _| {
		counter.fetch_add(1, Ordering::SeqCst);
	});
	(handler, calls)
}

#[tokio::test]
async fn test_overlapping_filters_fire_once_per_match() {
	let stub = StubTransport::new();
	let session = connected(&stub, config()).await;

	let (exact, exact_calls) = counting_handler();
	let (single, single_calls) = counting_handler();
	let (multi, multi_calls) = counting_handler();
	// Registered last, so it runs after the others
	let (marker, mut rx) = recording_handler();

	session
		.subscribe(["home/kitchen/temp"], exact, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["home/+/temp"], single, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["home/#"], multi, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["home/#"], marker, QoS::AtMostOnce)
		.await
		.unwrap();
	assert_eq!(session.subscription_count(), 4);

	stub.deliver("home/kitchen/temp", b"22").await;
	next_message(&mut rx).await;
	assert_eq!(exact_calls.load(Ordering::SeqCst), 1);
	assert_eq!(single_calls.load(Ordering::SeqCst), 1);
	assert_eq!(multi_calls.load(Ordering::SeqCst), 1);

	stub.deliver("home/garage", b"closed").await;
	next_message(&mut rx).await;
	assert_eq!(exact_calls.load(Ordering::SeqCst), 1);
	assert_eq!(single_calls.load(Ordering::SeqCst), 1);
	assert_eq!(multi_calls.load(Ordering::SeqCst), 2);
	session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_filter_requested_at_highest_qos() {
	let stub = StubTransport::new();
	let session = connected(&stub, config()).await;
	let (low, _low_rx) = recording_handler();
	let (high, _high_rx) = recording_handler();
	let (mid, _mid_rx) = recording_handler();

	session
		.subscribe(["alerts/#"], low, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["alerts/#"], high, QoS::ExactlyOnce)
		.await
		.unwrap();
	session
		.subscribe(["alerts/#"], mid, QoS::AtLeastOnce)
		.await
		.unwrap();

	assert_eq!(stub.subscribe_calls(), vec![
		vec![("alerts/#".to_string(), QoS::AtMostOnce)],
		vec![("alerts/#".to_string(), QoS::ExactlyOnce)],
		vec![("alerts/#".to_string(), QoS::ExactlyOnce)],
	]);
	session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_rejected_filter_is_rolled_back() {
	let stub = StubTransport::new();
	stub.reject_filter("secret/#");
	let session = connected(&stub, config()).await;
	let (handler, mut rx) = recording_handler();

	let err = session
		.subscribe(["public/#", "secret/#"], handler, QoS::AtLeastOnce)
		.await
		.unwrap_err();
	assert_eq!(err, SessionError::SubscribeRejected {
		filters: vec!["secret/#".to_string()],
	});
	assert_eq!(session.subscription_count(), 1);

	stub.deliver("secret/plans", b"x").await;
	stub.deliver("public/news", b"y").await;
	assert_eq!(next_message(&mut rx).await.0, "public/news");
	session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_invalid_filters_are_refused_locally() {
	let stub = StubTransport::new();
	let session = connected(&stub, config()).await;
	let (handler, _rx) = recording_handler();

	let err = session
		.subscribe(["a/#/b"], handler.clone(), QoS::AtMostOnce)
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		SessionError::InvalidFilter(TopicError::Filter(
			TopicFilterError::HashPosition { .. }
		))
	));

	let err = session
		.subscribe(Vec::<String>::new(), handler, QoS::AtMostOnce)
		.await
		.unwrap_err();
	assert_eq!(
		err,
		SessionError::InvalidFilter(TopicError::Filter(
			TopicFilterError::NoFilters
		))
	);
	assert!(stub.subscribe_calls().is_empty());
	assert_eq!(session.subscription_count(), 0);
	session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_is_idempotent() {
	let stub = StubTransport::new();
	let session = connected(&stub, config()).await;
	let (first, mut rx) = recording_handler();
	let (second, _second_rx) = recording_handler();
	session
		.subscribe(["news/#"], first, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["news/#"], second, QoS::AtMostOnce)
		.await
		.unwrap();

	session.unsubscribe(["news/#"]).await.unwrap();
	session.unsubscribe(["news/#"]).await.unwrap();
	assert_eq!(stub.unsubscribe_calls(), vec![vec!["news/#".to_string()]]);
	assert_eq!(session.subscription_count(), 0);

	stub.deliver("news/today", b"nothing").await;
	settle().await;
	assert!(rx.try_recv().is_err());
	session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_unsubscribe_handler_keeps_other_handlers() {
	let stub = StubTransport::new();
	let session = connected(&stub, config()).await;
	let (first, mut first_rx) = recording_handler();
	let (second, mut second_rx) = recording_handler();
	let first_id = first.id();
	session
		.subscribe(["news/#", "weather/+"], first, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["news/#"], second, QoS::AtMostOnce)
		.await
		.unwrap();

	session
		.unsubscribe_handler(["news/#", "weather/+"], first_id)
		.await
		.unwrap();
	// `news/#` still has a handler, so only `weather/+` leaves the broker
	assert_eq!(stub.unsubscribe_calls(), vec![vec![
		"weather/+".to_string()
	]]);
	assert_eq!(session.subscription_count(), 1);

	stub.deliver("news/today", b"headline").await;
	assert_eq!(next_message(&mut second_rx).await.0, "news/today");
	settle().await;
	assert!(first_rx.try_recv().is_err());
	session.disconnect().await.unwrap();
}

#[tokio::test]
async fn test_failing_handler_is_isolated() {
	let stub = StubTransport::new();
	let session = connected(&stub, config()).await;
	let mut events = session.events();

	let failing = Handler::new(|_, _| Err("cannot parse reading".into()));
	let failing_id = failing.id();
	let panicking = Handler::from_fn(|_, _| panic!("handler bug"));
	let (healthy, mut rx) = recording_handler();
	session
		.subscribe(["sensors/+"], failing, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["sensors/#"], panicking, QoS::AtMostOnce)
		.await
		.unwrap();
	session
		.subscribe(["sensors/temp"], healthy, QoS::AtMostOnce)
		.await
		.unwrap();

	stub.deliver("sensors/temp", b"oops").await;
	assert_eq!(next_message(&mut rx).await.0, "sensors/temp");

	let event = expect_event(&mut events, |event| {
		matches!(event, SessionEvent::HandlerFailed(err) if err.handler == failing_id)
	})
	.await;
	let SessionEvent::HandlerFailed(err) = event else {
		unreachable!()
	};
	assert_eq!(err.topic, "sensors/temp");
	assert_eq!(err.filter, "sensors/+");
	assert_eq!(err.reason, "cannot parse reading");

	let event = expect_event(&mut events, |event| {
		matches!(event, SessionEvent::HandlerFailed(err) if err.filter == "sensors/#")
	})
	.await;
	let SessionEvent::HandlerFailed(err) = event else {
		unreachable!()
	};
	assert!(err.reason.contains("handler bug"));

	// Dispatch keeps working afterwards
	stub.deliver("sensors/temp", b"21").await;
	assert_eq!(next_message(&mut rx).await.1, Bytes::from_static(b"21"));
	assert!(session.is_connected());
	session.disconnect().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_subscribe_timeout_rolls_back() {
	let stub = StubTransport::new();
	let session = connected(
		&stub,
		config().with_ack_timeout(Duration::from_millis(300)),
	)
	.await;
	stub.set_hang_subscribe(true);
	let (handler, _rx) = recording_handler();

	let err = session
		.subscribe(["slow/#"], handler, QoS::AtLeastOnce)
		.await
		.unwrap_err();
	assert_eq!(err, SessionError::OperationTimeout {
		operation: "subscribe",
		timeout_millis: 300,
	});
	assert_eq!(session.subscription_count(), 0);
	session.disconnect().await.unwrap();
}
