#![allow(missing_docs)]
use std::collections::HashMap;

use rumqttc::QoS;

use super::handler::{Handler, HandlerId};
use crate::topic::{FilterTree, TopicFilter};

/// One registered (filter, handler) pair
#[derive(Debug, Clone)]
pub struct Subscription {
	pub filter: TopicFilter,
	pub qos: QoS,
	pub handler: Handler,
}

type HandlerTable = HashMap<HandlerId, Subscription>;

fn qos_rank(qos: QoS) -> u8 {
	qos as u8
}

/// In-memory index of all subscriptions, keyed by filter and handler.
///
/// Does no I/O. Every entry stored under one tree node shares the same
/// filter, so the tree node doubles as the per-filter table.
#[derive(Debug, Default)]
pub struct SubscriptionRegistry {
	tree: FilterTree<HandlerTable>,
}

impl SubscriptionRegistry {
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `handler` on `filter`.
	///
	/// Re-adding an existing pair replaces its QoS and returns the previous
	/// one so callers can roll the change back.
	pub fn add(
		&mut self,
		filter: TopicFilter,
		qos: QoS,
		handler: Handler,
	) -> Option<QoS> {
		let table = self.tree.entry(&filter);
		table
			.insert(handler.id(), Subscription {
				filter,
				qos,
				handler,
			})
			.map(|previous| previous.qos)
	}

	/// Removes one handler from one filter.
	pub fn remove(
		&mut self,
		filter: &TopicFilter,
		handler: HandlerId,
	) -> Option<Subscription> {
		let mut removed = None;
		self.tree
			.update(filter.segments(), |table| removed = table.remove(&handler))
			.ok()?;
		removed
	}

	/// Removes every handler registered on `filter`.
	pub fn remove_filter(&mut self, filter: &TopicFilter) -> Vec<Subscription> {
		let mut removed = Vec::new();
		let _ = self.tree.update(filter.segments(), |table| {
			removed.extend(table.drain().map(|(_, subscription)| subscription))
		});
		removed.sort_by_key(|subscription| subscription.handler.id());
		removed
	}

	/// All subscriptions whose filter matches `topic`.
	///
	/// Overlapping filters each contribute their own entries. The result is
	/// cloned so handlers can run without holding the registry lock.
	pub fn matches_for(&self, topic: &str) -> Vec<Subscription> {
		let mut matches: Vec<Subscription> = self
			.tree
			.find(topic)
			.into_iter()
			.flat_map(HashMap::values)
			.cloned()
			.collect();
		matches.sort_by_key(|subscription| subscription.handler.id());
		matches
	}

	/// Unique filters with the highest QoS requested by any of their handlers
	pub fn resubscribe_filters(&self) -> Vec<(TopicFilter, QoS)> {
		let mut filters: Vec<(TopicFilter, QoS)> = self
			.tree
			.values()
			.into_iter()
			.filter_map(|table| {
				let filter = table.values().next()?.filter.clone();
				let qos = Self::table_max_qos(table)?;
				Some((filter, qos))
			})
			.collect();
		filters.sort_by(|(a, _), (b, _)| a.as_str().cmp(b.as_str()));
		filters
	}

	/// Highest QoS registered on exactly this filter
	pub fn max_qos(&self, filter: &TopicFilter) -> Option<QoS> {
		self.tree.get(filter).and_then(Self::table_max_qos)
	}

	pub fn contains_filter(&self, filter: &TopicFilter) -> bool {
		self.tree.get(filter).is_some_and(|table| !table.is_empty())
	}

	pub fn len(&self) -> usize {
		self.tree.values().into_iter().map(HashMap::len).sum()
	}

	pub fn is_empty(&self) -> bool {
		self.tree.is_empty()
	}

	pub fn clear(&mut self) {
		self.tree = FilterTree::new();
	}

	fn table_max_qos(table: &HandlerTable) -> Option<QoS> {
		table
			.values()
			.map(|subscription| subscription.qos)
			.max_by_key(|qos| qos_rank(*qos))
	}
}
