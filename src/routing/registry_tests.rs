//! Tests for SubscriptionRegistry bookkeeping and matching

use rumqttc::QoS;

use super::{Handler, HandlerId, SubscriptionRegistry};
use crate::topic::TopicFilter;

fn filter(s: &str) -> TopicFilter {
	TopicFilter::new(s).unwrap()
}

fn noop() -> Handler {
	Handler::from_fn(|_, _| {})
}

fn matched_ids(registry: &SubscriptionRegistry, topic: &str) -> Vec<HandlerId> {
	registry
		.matches_for(topic)
		.iter()
		.map(|subscription| subscription.handler.id())
		.collect()
}

#[test]
fn test_matches_wildcards_and_overlaps() {
	let mut registry = SubscriptionRegistry::new();
	let exact = noop();
	let single = noop();
	let multi = noop();
	registry.add(filter("sensors/temp"), QoS::AtLeastOnce, exact.clone());
	registry.add(filter("sensors/+"), QoS::AtMostOnce, single.clone());
	registry.add(filter("sensors/#"), QoS::AtMostOnce, multi.clone());

	let mut expected = vec![exact.id(), single.id(), multi.id()];
	expected.sort();
	assert_eq!(matched_ids(&registry, "sensors/temp"), expected);

	let mut expected = vec![single.id(), multi.id()];
	expected.sort();
	assert_eq!(matched_ids(&registry, "sensors/humidity"), expected);

	assert_eq!(matched_ids(&registry, "sensors"), vec![multi.id()]);
	assert_eq!(matched_ids(&registry, "sensors/a/b"), vec![multi.id()]);
	assert!(matched_ids(&registry, "actuators/x").is_empty());
}

#[test]
fn test_add_replaces_qos_for_same_pair() {
	let mut registry = SubscriptionRegistry::new();
	let handler = noop();
	assert_eq!(
		registry.add(filter("a/b"), QoS::AtMostOnce, handler.clone()),
		None
	);
	assert_eq!(
		registry.add(filter("a/b"), QoS::ExactlyOnce, handler.clone()),
		Some(QoS::AtMostOnce)
	);
	assert_eq!(registry.len(), 1);
	assert_eq!(registry.max_qos(&filter("a/b")), Some(QoS::ExactlyOnce));
}

#[test]
fn test_same_handler_on_many_filters() {
	let mut registry = SubscriptionRegistry::new();
	let handler = noop();
	registry.add(filter("a/+"), QoS::AtMostOnce, handler.clone());
	registry.add(filter("a/b"), QoS::AtMostOnce, handler.clone());

	// Invoked once per matching subscription
	assert_eq!(matched_ids(&registry, "a/b"), vec![handler.id(), handler.id()]);
	assert_eq!(registry.len(), 2);
}

#[test]
fn test_remove_single_handler() {
	let mut registry = SubscriptionRegistry::new();
	let first = noop();
	let second = noop();
	registry.add(filter("a/#"), QoS::AtLeastOnce, first.clone());
	registry.add(filter("a/#"), QoS::AtMostOnce, second.clone());

	let removed = registry.remove(&filter("a/#"), first.id()).unwrap();
	assert_eq!(removed.handler.id(), first.id());
	assert!(registry.contains_filter(&filter("a/#")));
	assert_eq!(registry.max_qos(&filter("a/#")), Some(QoS::AtMostOnce));

	assert!(registry.remove(&filter("a/#"), first.id()).is_none());
	assert!(registry.remove(&filter("x/y"), second.id()).is_none());

	registry.remove(&filter("a/#"), second.id());
	assert!(registry.is_empty());
	assert!(!registry.contains_filter(&filter("a/#")));
}

#[test]
fn test_remove_filter_is_idempotent() {
	let mut registry = SubscriptionRegistry::new();
	registry.add(filter("a/+/c"), QoS::AtMostOnce, noop());
	registry.add(filter("a/+/c"), QoS::AtLeastOnce, noop());
	registry.add(filter("a/b/c"), QoS::AtMostOnce, noop());

	assert_eq!(registry.remove_filter(&filter("a/+/c")).len(), 2);
	assert!(registry.remove_filter(&filter("a/+/c")).is_empty());
	// No node exists for a filter that was never added
	assert!(registry.remove_filter(&filter("z/#")).is_empty());
	assert_eq!(registry.len(), 1);
	assert_eq!(registry.matches_for("a/x/c").len(), 0);
	assert_eq!(registry.matches_for("a/b/c").len(), 1);
}

#[test]
fn test_resubscribe_filters_use_max_qos() {
	let mut registry = SubscriptionRegistry::new();
	registry.add(filter("b/#"), QoS::AtMostOnce, noop());
	registry.add(filter("a/+"), QoS::AtMostOnce, noop());
	registry.add(filter("a/+"), QoS::ExactlyOnce, noop());
	registry.add(filter("a/+"), QoS::AtLeastOnce, noop());

	let filters = registry.resubscribe_filters();
	assert_eq!(filters, vec![
		(filter("a/+"), QoS::ExactlyOnce),
		(filter("b/#"), QoS::AtMostOnce),
	]);
}

#[test]
fn test_clear() {
	let mut registry = SubscriptionRegistry::new();
	registry.add(filter("a"), QoS::AtMostOnce, noop());
	registry.add(filter("#"), QoS::AtMostOnce, noop());
	assert_eq!(registry.len(), 2);
	registry.clear();
	assert!(registry.is_empty());
	assert!(registry.matches_for("a").is_empty());
	assert!(registry.resubscribe_filters().is_empty());
}
