use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::time::{Instant, timeout_at};

use super::tracker::{DeliveryResult, DeliveryTracker};
use crate::client::error::SessionError;
use crate::transport::DeliveryId;

enum Waiter {
	Done,
	Pending {
		rx: oneshot::Receiver<DeliveryResult>,
		tracker: Arc<DeliveryTracker>,
	},
}

/// Handle returned by the non-blocking publish variants.
///
/// [`wait`](DeliveryHandle::wait) resolves once the broker acknowledges the
/// publish, the delivery fails, or the acknowledgement deadline passes.
/// Dropping an unresolved handle stops tracking the delivery.
#[must_use = "dropping a DeliveryHandle stops tracking the delivery"]
pub struct DeliveryHandle {
	id: DeliveryId,
	deadline: Instant,
	waiter: Waiter,
}

impl DeliveryHandle {
	/// Handle of a QoS 0 publish, complete as soon as it was handed off
	pub(crate) fn completed(id: DeliveryId) -> Self {
		Self {
			id,
			deadline: Instant::now(),
			waiter: Waiter::Done,
		}
	}

	pub(crate) fn pending(
		id: DeliveryId,
		deadline: Instant,
		rx: oneshot::Receiver<DeliveryResult>,
		tracker: Arc<DeliveryTracker>,
	) -> Self {
		Self {
			id,
			deadline,
			waiter: Waiter::Pending { rx, tracker },
		}
	}

	pub fn id(&self) -> DeliveryId {
		self.id
	}

	/// Point in time after which the delivery counts as timed out
	pub fn deadline(&self) -> Instant {
		self.deadline
	}

	/// True while an acknowledgement is still expected.
	pub fn is_pending(&self) -> bool {
		matches!(self.waiter, Waiter::Pending { .. })
	}

	/// Waits for the outcome of the delivery.
	pub async fn wait(mut self) -> Result<(), SessionError> {
		let Waiter::Pending { rx, tracker } = &mut self.waiter else {
			return Ok(());
		};
		let outcome = match timeout_at(self.deadline, &mut *rx).await {
			| Ok(Ok(outcome)) => outcome,
			| Ok(Err(_)) => Err(SessionError::Aborted {
				reason: "delivery tracking stopped".to_string(),
			}),
			| Err(_) if tracker.expire(self.id) => {
				Err(tracker.timeout_error(self.id))
			}
			// Lost the race against a concurrent outcome
			| Err(_) => rx
				.try_recv()
				.unwrap_or_else(|_| Err(tracker.timeout_error(self.id))),
		};
		self.waiter = Waiter::Done;
		outcome
	}
}

impl std::fmt::Debug for DeliveryHandle {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("DeliveryHandle")
			.field("id", &self.id)
			.field("deadline", &self.deadline)
			.field("pending", &self.is_pending())
			.finish()
	}
}

impl Drop for DeliveryHandle {
	fn drop(&mut self) {
		if let Waiter::Pending { tracker, .. } = &self.waiter {
			tracker.abandon(self.id);
		}
	}
}
