#![allow(missing_docs)]
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::oneshot;
use tokio::time::Instant;
use tracing::{debug, warn};

use crate::client::error::SessionError;
use crate::transport::DeliveryId;

/// Final outcome of one tracked delivery
pub type DeliveryResult = Result<(), SessionError>;

/// An outbound publish waiting for its acknowledgement
#[derive(Debug, Clone)]
pub struct PendingDelivery {
	pub topic: ArcStr,
	pub payload: Bytes,
	pub qos: QoS,
	pub submitted_at: Instant,
}

struct Entry {
	delivery: PendingDelivery,
	notify: oneshot::Sender<DeliveryResult>,
}

/// Outcome that arrived before the publisher registered the id
struct Unclaimed {
	outcome: DeliveryResult,
	received_at: Instant,
}

#[derive(Default)]
struct TrackerState {
	pending: HashMap<DeliveryId, Entry>,
	unclaimed: HashMap<DeliveryId, Unclaimed>,
}

/// Table of in-flight deliveries.
///
/// Each id is resolved at most once: whichever of ack, failure, expiry,
/// abandonment or teardown comes first removes the entry, later outcomes
/// for the same id find nothing.
pub struct DeliveryTracker {
	state: Mutex<TrackerState>,
	ack_timeout: Duration,
}

impl DeliveryTracker {
	pub fn new(ack_timeout: Duration) -> Self {
		Self {
			state: Mutex::new(TrackerState::default()),
			ack_timeout,
		}
	}

	fn lock(&self) -> MutexGuard<'_, TrackerState> {
		self.state.lock().unwrap_or_else(PoisonError::into_inner)
	}

	pub fn ack_timeout(&self) -> Duration {
		self.ack_timeout
	}

	pub(crate) fn timeout_error(&self, id: DeliveryId) -> SessionError {
		SessionError::DeliveryTimeout {
			id,
			timeout_millis: self.ack_timeout.as_millis() as u64,
		}
	}

	/// Starts tracking `id` and returns the receiver of its outcome.
	///
	/// An outcome that already arrived for `id` is delivered immediately.
	pub fn register(
		&self,
		id: DeliveryId,
		delivery: PendingDelivery,
	) -> oneshot::Receiver<DeliveryResult> {
		let (notify, rx) = oneshot::channel();
		let mut state = self.lock();
		if let Some(early) = state.unclaimed.remove(&id) {
			debug!(delivery_id = %id, "Outcome arrived before registration");
			let _ = notify.send(early.outcome);
		} else {
			state.pending.insert(id, Entry { delivery, notify });
		}
		rx
	}

	fn resolve(&self, id: DeliveryId, outcome: DeliveryResult) -> bool {
		let mut state = self.lock();
		match state.pending.remove(&id) {
			| Some(entry) => {
				let _ = entry.notify.send(outcome);
				true
			}
			| None => {
				state.unclaimed.insert(id, Unclaimed {
					outcome,
					received_at: Instant::now(),
				});
				false
			}
		}
	}

	/// Resolves `id` successfully. Returns false if it was not pending yet.
	pub fn complete(&self, id: DeliveryId) -> bool {
		self.resolve(id, Ok(()))
	}

	/// Resolves `id` with `error`. Returns false if it was not pending yet.
	pub fn fail(&self, id: DeliveryId, error: SessionError) -> bool {
		self.resolve(id, Err(error))
	}

	/// Drops `id` after its waiter hit the deadline.
	///
	/// Returns true if the entry was still pending, meaning the timeout is
	/// the outcome. False means another outcome won the race and is already
	/// in the waiter's channel.
	pub fn expire(&self, id: DeliveryId) -> bool {
		let expired = self.lock().pending.remove(&id).is_some();
		if expired {
			warn!(delivery_id = %id, timeout = ?self.ack_timeout, "Delivery was not acknowledged in time");
		}
		expired
	}

	/// Drops `id` without notifying anyone.
	pub fn abandon(&self, id: DeliveryId) {
		if self.lock().pending.remove(&id).is_some() {
			debug!(delivery_id = %id, "Delivery abandoned by caller");
		}
	}

	/// Times out every entry older than the acknowledgement timeout and
	/// purges stale unclaimed outcomes. Returns the expired ids.
	pub fn timeout_sweep(&self, now: Instant) -> Vec<DeliveryId> {
		let timeout = self.ack_timeout;
		let mut state = self.lock();
		let expired: Vec<DeliveryId> = state
			.pending
			.iter()
			.filter(|(_, entry)| {
				now.saturating_duration_since(entry.delivery.submitted_at)
					>= timeout
			})
			.map(|(id, _)| *id)
			.collect();
		for id in &expired {
			if let Some(entry) = state.pending.remove(id) {
				warn!(delivery_id = %id, topic = %entry.delivery.topic, "Delivery timed out");
				let _ = entry.notify.send(Err(self.timeout_error(*id)));
			}
		}
		state.unclaimed.retain(|_, early| {
			now.saturating_duration_since(early.received_at) < timeout
		});
		expired
	}

	/// Resolves every pending entry with `error`. Returns how many there
	/// were.
	pub fn fail_all(&self, error: SessionError) -> usize {
		let mut state = self.lock();
		state.unclaimed.clear();
		let count = state.pending.len();
		for (_, entry) in state.pending.drain() {
			let _ = entry.notify.send(Err(error.clone()));
		}
		if count > 0 {
			debug!(count, error = %error, "Failed all pending deliveries");
		}
		count
	}

	pub fn contains(&self, id: DeliveryId) -> bool {
		self.lock().pending.contains_key(&id)
	}

	/// Number of deliveries still waiting for an outcome
	pub fn len(&self) -> usize {
		self.lock().pending.len()
	}

	pub fn is_empty(&self) -> bool {
		self.lock().pending.is_empty()
	}
}
