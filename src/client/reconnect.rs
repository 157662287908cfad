use std::time::Duration;

use super::config::ReconnectPolicy;

/// Exponential backoff between reconnect attempts
#[derive(Debug, Clone)]
pub(crate) struct Backoff {
	policy: ReconnectPolicy,
	attempt: u32,
}

impl Backoff {
	pub(crate) fn new(policy: ReconnectPolicy) -> Self {
		Self { policy, attempt: 0 }
	}

	/// Number of attempts handed out so far
	pub(crate) fn attempt(&self) -> u32 {
		self.attempt
	}

	/// Delay before the next attempt, `None` once attempts are exhausted.
	pub(crate) fn next_delay(&mut self) -> Option<Duration> {
		if self
			.policy
			.max_attempts
			.is_some_and(|max| self.attempt >= max)
		{
			return None;
		}
		self.attempt += 1;
		let factor = 2_u32.saturating_pow((self.attempt - 1).min(16));
		let delay = self.policy.initial_delay.saturating_mul(factor);
		Some(delay.min(self.policy.max_delay))
	}
}
