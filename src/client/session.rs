use std::fmt;
use std::sync::{
	Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak,
};
use std::time::Duration;

use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::{Mutex, broadcast, mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use super::config::SessionConfig;
use super::error::{ConnectError, HandlerError, SessionError};
use super::events::SessionEvent;
use super::message::OutboundMessage;
use super::reconnect::Backoff;
use super::state::SessionState;
use crate::Result;
use crate::delivery::{DeliveryHandle, DeliveryTracker, PendingDelivery};
use crate::routing::{Handler, HandlerId, SubscriptionRegistry};
use crate::topic::validation::validate_topic_name;
use crate::topic::{TopicFilter, TopicFilterError};
use crate::transport::{
	DeliveryId, InboundMessage, SubscribeOutcome, TransportAdapter,
	TransportError, TransportEvent,
};

fn millis(duration: Duration) -> u64 {
	duration.as_millis() as u64
}

/// MQTT session on top of a [`TransportAdapter`].
///
/// Owns the connection lifecycle, the subscription registry and the table
/// of pending deliveries. Cloning is cheap and every clone drives the same
/// session.
///
/// Call [`disconnect`](Self::disconnect) and await it before dropping the
/// last clone of a connected session.
pub struct SessionManager<T: TransportAdapter> {
	inner: Arc<SessionInner<T>>,
}

struct SessionInner<T: TransportAdapter> {
	transport: T,
	config: SessionConfig,
	state: watch::Sender<SessionState>,
	registry: RwLock<SubscriptionRegistry>,
	tracker: Arc<DeliveryTracker>,
	lifecycle: Mutex<Lifecycle>,
	events: broadcast::Sender<SessionEvent>,
}

/// Background tasks; only touched with the lifecycle lock held
#[derive(Default)]
struct Lifecycle {
	dispatcher: Option<JoinHandle<()>>,
	reconnector: Option<JoinHandle<()>>,
}

impl<T: TransportAdapter> Clone for SessionManager<T> {
	fn clone(&self) -> Self {
		Self {
			inner: self.inner.clone(),
		}
	}
}

impl<T: TransportAdapter> fmt::Debug for SessionManager<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("SessionManager")
			.field("client_id", &self.inner.config.client_id)
			.field("state", &self.state())
			.finish()
	}
}

impl<T: TransportAdapter> SessionManager<T> {
	/// Creates a disconnected session.
	///
	/// Validates `config` and performs no I/O.
	pub fn new(transport: T, config: SessionConfig) -> Result<Self> {
		config.validate()?;
		let (state, _) = watch::channel(SessionState::Disconnected);
		let (events, _) =
			broadcast::channel(config.settings.notification_capacity);
		let tracker = Arc::new(DeliveryTracker::new(config.ack_timeout()));
		Ok(Self {
			inner: Arc::new(SessionInner {
				transport,
				config,
				state,
				registry: RwLock::new(SubscriptionRegistry::new()),
				tracker,
				lifecycle: Mutex::new(Lifecycle::default()),
				events,
			}),
		})
	}

	/// Creates a session and connects it.
	pub async fn connect_with_config(
		transport: T,
		config: SessionConfig,
	) -> Result<Self> {
		let session = Self::new(transport, config)?;
		session.connect().await?;
		Ok(session)
	}

	/// Connects to the broker.
	///
	/// Waits at most the configured connect timeout. When the broker holds
	/// no session state every registered subscription is replayed before
	/// inbound dispatch starts. Succeeds immediately if already connected
	/// and cancels a running reconnect loop otherwise.
	pub async fn connect(&self) -> Result<()> {
		let inner = &self.inner;
		let mut lifecycle = inner.lifecycle.lock().await;
		if inner.state().is_connected() {
			debug!("connect() on an already connected session");
			return Ok(());
		}
		if let Some(reconnector) = lifecycle.reconnector.take() {
			reconnector.abort();
		}
		inner.establish(&mut lifecycle).await.map(|_| ())
	}

	/// Publishes and waits for the broker acknowledgement.
	///
	/// QoS 0 completes once the transport accepted the message. Higher
	/// levels fail with [`SessionError::DeliveryTimeout`] when no
	/// acknowledgement arrives within the ack timeout.
	pub async fn publish(
		&self,
		topic: &str,
		payload: impl Into<Bytes>,
		qos: QoS,
	) -> Result<DeliveryId> {
		let message = OutboundMessage::new(topic, payload).with_qos(qos);
		self.publish_message(message).await
	}

	/// Publishes without waiting for the acknowledgement.
	pub async fn begin_publish(
		&self,
		topic: &str,
		payload: impl Into<Bytes>,
		qos: QoS,
	) -> Result<DeliveryHandle> {
		let message = OutboundMessage::new(topic, payload).with_qos(qos);
		self.begin_publish_message(message).await
	}

	/// Same as [`publish`](Self::publish) with retain flag and default QoS.
	pub async fn publish_message(
		&self,
		message: OutboundMessage,
	) -> Result<DeliveryId> {
		let handle = self.begin_publish_message(message).await?;
		let id = handle.id();
		handle.wait().await?;
		Ok(id)
	}

	/// Same as [`begin_publish`](Self::begin_publish) with retain flag and
	/// default QoS.
	pub async fn begin_publish_message(
		&self,
		message: OutboundMessage,
	) -> Result<DeliveryHandle> {
		validate_topic_name(&message.topic)?;
		let inner = &self.inner;
		inner.ensure_connected()?;

		let qos = message.qos.unwrap_or(inner.config.default_qos);
		let id = inner
			.transport
			.publish(&message.topic, message.payload.clone(), qos, message.retain)
			.await?;
		debug!(topic = %message.topic, delivery_id = %id, qos = ?qos, "Message handed to transport");
		if qos == QoS::AtMostOnce {
			return Ok(DeliveryHandle::completed(id));
		}

		let submitted_at = Instant::now();
		let rx = inner.tracker.register(id, PendingDelivery {
			topic: message.topic,
			payload: message.payload,
			qos,
			submitted_at,
		});
		// Teardown may have run while the message was handed off
		if !inner.state().is_connected() && inner.tracker.contains(id) {
			inner.tracker.fail(id, SessionError::ConnectionLost {
				cause: "connection lost during publish".to_string(),
			});
		}
		Ok(DeliveryHandle::pending(
			id,
			submitted_at + inner.tracker.ack_timeout(),
			rx,
			inner.tracker.clone(),
		))
	}

	/// Registers `handler` on every filter and subscribes at the broker.
	///
	/// Each filter is requested at the highest QoS registered for it. Filters
	/// the broker rejects are rolled back and reported through
	/// [`SessionError::SubscribeRejected`]; accepted ones stay registered.
	/// A transport failure or timeout rolls back the whole call.
	pub async fn subscribe<I>(
		&self,
		filters: I,
		handler: Handler,
		qos: QoS,
	) -> Result<()>
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let filters = parse_filters(filters)?;
		let inner = &self.inner;
		inner.ensure_connected()?;

		let previous: Vec<Option<QoS>> = {
			let mut registry = inner.registry_write();
			filters
				.iter()
				.map(|filter| registry.add(filter.clone(), qos, handler.clone()))
				.collect()
		};
		let request: Vec<(TopicFilter, QoS)> = {
			let registry = inner.registry_read();
			filters
				.iter()
				.map(|filter| {
					(filter.clone(), registry.max_qos(filter).unwrap_or(qos))
				})
				.collect()
		};

		let ack_timeout = inner.config.ack_timeout();
		let outcomes = match time::timeout(
			ack_timeout,
			inner.transport.subscribe(&request),
		)
		.await
		{
			| Ok(Ok(outcomes)) => outcomes,
			| Ok(Err(err)) => {
				inner.roll_back(&filters, &previous, &handler);
				return Err(err.into());
			}
			| Err(_) => {
				inner.roll_back(&filters, &previous, &handler);
				return Err(SessionError::OperationTimeout {
					operation: "subscribe",
					timeout_millis: millis(ack_timeout),
				});
			}
		};

		let rejected = rejected_indices(filters.len(), &outcomes);
		if rejected.is_empty() {
			debug!(filters = ?request, handler = %handler.id(), "Subscribed");
			return Ok(());
		}

		let mut names = Vec::with_capacity(rejected.len());
		for i in rejected {
			inner.restore(&filters[i], previous[i], &handler);
			names.push(filters[i].to_string());
		}
		warn!(filters = ?names, "Broker rejected subscription");
		Err(SessionError::SubscribeRejected { filters: names })
	}

	/// Removes every subscription on each filter.
	///
	/// Idempotent. The broker is only contacted for filters that had
	/// entries, and only while connected.
	pub async fn unsubscribe<I>(&self, filters: I) -> Result<()>
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let filters = parse_filters(filters)?;
		let removed: Vec<TopicFilter> = {
			let mut registry = self.inner.registry_write();
			filters
				.into_iter()
				.filter(|filter| !registry.remove_filter(filter).is_empty())
				.collect()
		};
		self.inner.unsubscribe_remote(removed).await
	}

	/// Removes one handler from each filter.
	///
	/// The broker is told to unsubscribe only from filters left without any
	/// handler.
	pub async fn unsubscribe_handler<I>(
		&self,
		filters: I,
		handler: HandlerId,
	) -> Result<()>
	where
		I: IntoIterator,
		I::Item: AsRef<str>,
	{
		let filters = parse_filters(filters)?;
		let emptied: Vec<TopicFilter> = {
			let mut registry = self.inner.registry_write();
			filters
				.into_iter()
				.filter(|filter| {
					registry.remove(filter, handler).is_some()
						&& !registry.contains_filter(filter)
				})
				.collect()
		};
		self.inner.unsubscribe_remote(emptied).await
	}

	/// Disconnects from the broker.
	///
	/// The graceful part is bounded by the disconnect timeout, after which
	/// the transport is released regardless. Pending deliveries fail with
	/// [`SessionError::Aborted`]. Subscriptions stay registered for the next
	/// connect. A no-op when not connected.
	pub async fn disconnect(&self) -> Result<()> {
		let inner = &self.inner;
		let mut lifecycle = inner.lifecycle.lock().await;
		if let Some(reconnector) = lifecycle.reconnector.take() {
			reconnector.abort();
			if inner.state() == SessionState::Connecting {
				info!("Reconnect cancelled by disconnect");
				inner.set_state(SessionState::Disconnected);
				inner.emit(SessionEvent::Disconnected);
				return Ok(());
			}
		}
		if !inner.state().is_connected() {
			debug!("disconnect() on a session that is not connected");
			return Ok(());
		}

		inner.set_state(SessionState::Disconnecting);
		let timeout = inner.config.disconnect_timeout;
		match time::timeout(timeout, inner.transport.disconnect()).await {
			| Ok(Ok(())) => debug!("Graceful disconnect completed"),
			| Ok(Err(err)) => {
				warn!(error = %err, "Graceful disconnect failed")
			}
			| Err(_) => {
				warn!(timeout = ?timeout, "Graceful disconnect timed out")
			}
		}
		inner.transport.release();
		if let Some(dispatcher) = lifecycle.dispatcher.take() {
			dispatcher.abort();
		}
		let aborted = inner.tracker.fail_all(SessionError::Aborted {
			reason: "session disconnected".to_string(),
		});
		inner.set_state(SessionState::Disconnected);
		info!(aborted_deliveries = aborted, "Session disconnected");
		inner.emit(SessionEvent::Disconnected);
		Ok(())
	}

	pub fn is_connected(&self) -> bool {
		self.inner.state().is_connected()
	}

	pub fn state(&self) -> SessionState {
		self.inner.state()
	}

	/// Receiver that observes every state change.
	pub fn state_changes(&self) -> watch::Receiver<SessionState> {
		self.inner.state.subscribe()
	}

	/// Subscribes to session notifications.
	pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
		self.inner.events.subscribe()
	}

	/// Number of publishes still waiting for an acknowledgement
	pub fn pending_deliveries(&self) -> usize {
		self.inner.tracker.len()
	}

	/// Number of registered (filter, handler) pairs
	pub fn subscription_count(&self) -> usize {
		self.inner.registry_read().len()
	}

	pub fn config(&self) -> &SessionConfig {
		&self.inner.config
	}

	pub fn transport(&self) -> &T {
		&self.inner.transport
	}
}

fn parse_filters<I>(filters: I) -> Result<Vec<TopicFilter>>
where
	I: IntoIterator,
	I::Item: AsRef<str>,
{
	let mut parsed: Vec<TopicFilter> = Vec::new();
	for filter in filters {
		let filter = TopicFilter::new(filter.as_ref())?;
		if !parsed.contains(&filter) {
			parsed.push(filter);
		}
	}
	if parsed.is_empty() {
		return Err(TopicFilterError::NoFilters.into());
	}
	Ok(parsed)
}

/// Positions of the requested filters the broker did not grant.
///
/// A missing outcome counts as a rejection.
fn rejected_indices(
	requested: usize,
	outcomes: &[SubscribeOutcome],
) -> Vec<usize> {
	(0..requested)
		.filter(|i| {
			!outcomes.get(*i).is_some_and(SubscribeOutcome::is_granted)
		})
		.collect()
}

/// Releases the transport and resets the state unless disarmed
struct ConnectGuard<'a, T: TransportAdapter> {
	inner: &'a SessionInner<T>,
	armed: bool,
}

impl<T: TransportAdapter> ConnectGuard<'_, T> {
	fn disarm(mut self) {
		self.armed = false;
	}
}

impl<T: TransportAdapter> Drop for ConnectGuard<'_, T> {
	fn drop(&mut self) {
		if self.armed {
			self.inner.transport.release();
			self.inner.set_state(SessionState::Disconnected);
		}
	}
}

impl<T: TransportAdapter> SessionInner<T> {
	fn state(&self) -> SessionState {
		*self.state.borrow()
	}

	fn set_state(&self, next: SessionState) {
		let previous = self.state.send_replace(next);
		if previous != next {
			debug!(from = %previous, to = %next, "Session state changed");
		}
	}

	fn emit(&self, event: SessionEvent) {
		// No receivers is fine
		let _ = self.events.send(event);
	}

	fn ensure_connected(&self) -> Result<()> {
		if self.state().is_connected() {
			Ok(())
		} else {
			Err(SessionError::NotConnected)
		}
	}

	fn registry_read(&self) -> RwLockReadGuard<'_, SubscriptionRegistry> {
		self.registry.read().unwrap_or_else(PoisonError::into_inner)
	}

	fn registry_write(&self) -> RwLockWriteGuard<'_, SubscriptionRegistry> {
		self.registry.write().unwrap_or_else(PoisonError::into_inner)
	}

	/// Puts one (filter, handler) pair back to its state before subscribe
	fn restore(
		&self,
		filter: &TopicFilter,
		previous: Option<QoS>,
		handler: &Handler,
	) {
		let mut registry = self.registry_write();
		match previous {
			| Some(qos) => {
				registry.add(filter.clone(), qos, handler.clone());
			}
			| None => {
				registry.remove(filter, handler.id());
			}
		}
	}

	fn roll_back(
		&self,
		filters: &[TopicFilter],
		previous: &[Option<QoS>],
		handler: &Handler,
	) {
		for (filter, previous) in filters.iter().zip(previous) {
			self.restore(filter, *previous, handler);
		}
	}

	/// Connects the transport, replays subscriptions if needed and starts
	/// the dispatcher. Returns the broker's session-present flag.
	async fn establish(
		self: &Arc<Self>,
		lifecycle: &mut Lifecycle,
	) -> Result<bool> {
		self.set_state(SessionState::Connecting);
		let guard = ConnectGuard {
			inner: self.as_ref(),
			armed: true,
		};

		let options = self.config.connect_options();
		let connect_timeout = self.config.connect_timeout;
		info!(client_id = %options.client_id, host = %options.host, port = options.port, "Connecting to MQTT broker");
		let established =
			time::timeout(connect_timeout, self.transport.connect(&options))
				.await
				.map_err(|_| ConnectError::Timeout {
					timeout_millis: millis(connect_timeout),
				})?
				.map_err(ConnectError::Transport)?;

		let session_present = established.session_present;
		if session_present {
			info!("Broker preserved the session, subscriptions maintained");
		} else {
			self.replay().await?;
		}
		guard.disarm();

		lifecycle.dispatcher = Some(spawn_dispatcher(self, established.events));
		self.set_state(SessionState::Connected);
		info!(session_present, "Session connected");
		self.emit(SessionEvent::Connected { session_present });
		Ok(session_present)
	}

	/// Resubscribes every registered filter at its highest QoS
	async fn replay(&self) -> Result<()> {
		let filters = self.registry_read().resubscribe_filters();
		if filters.is_empty() {
			return Ok(());
		}
		info!(
			count = filters.len(),
			"Connected without session, resubscribing to all topics"
		);
		let ack_timeout = self.config.ack_timeout();
		let outcomes =
			time::timeout(ack_timeout, self.transport.subscribe(&filters))
				.await
				.map_err(|_| ConnectError::Replay {
					reason: format!(
						"subscribe timed out after {}ms",
						millis(ack_timeout)
					),
				})?
				.map_err(|err| ConnectError::Replay {
					reason: err.to_string(),
				})?;

		let rejected: Vec<String> = rejected_indices(filters.len(), &outcomes)
			.into_iter()
			.map(|i| filters[i].0.to_string())
			.collect();
		if !rejected.is_empty() {
			warn!(filters = ?rejected, "Broker rejected filters while resubscribing");
			self.emit(SessionEvent::ResubscribeRejected { filters: rejected });
		}
		Ok(())
	}

	async fn unsubscribe_remote(&self, filters: Vec<TopicFilter>) -> Result<()> {
		if filters.is_empty() {
			return Ok(());
		}
		if !self.state().is_connected() {
			debug!(filters = ?filters, "Not connected, removed local subscriptions only");
			return Ok(());
		}
		let ack_timeout = self.config.ack_timeout();
		match time::timeout(ack_timeout, self.transport.unsubscribe(&filters))
			.await
		{
			| Ok(Ok(())) => {
				debug!(filters = ?filters, "Unsubscribed");
				Ok(())
			}
			| Ok(Err(TransportError::NotConnected)) => Ok(()),
			| Ok(Err(err)) => Err(err.into()),
			| Err(_) => Err(SessionError::OperationTimeout {
				operation: "unsubscribe",
				timeout_millis: millis(ack_timeout),
			}),
		}
	}

	/// Invokes every matching handler once, outside the registry lock
	fn dispatch(&self, message: &InboundMessage) {
		let subscriptions = self.registry_read().matches_for(&message.topic);
		if subscriptions.is_empty() {
			debug!(topic = %message.topic, "No subscribers for topic");
			return;
		}
		for subscription in subscriptions {
			let handler = &subscription.handler;
			if let Err(reason) = handler.invoke(&message.topic, &message.payload)
			{
				let err = HandlerError {
					topic: message.topic.to_string(),
					filter: subscription.filter.to_string(),
					handler: handler.id(),
					reason,
				};
				error!(error = %err, "Message handler failed");
				self.emit(SessionEvent::HandlerFailed(err));
			}
		}
	}

	async fn connection_lost(self: &Arc<Self>, cause: String) {
		let mut lifecycle = self.lifecycle.lock().await;
		if !self.state().is_connected() {
			return;
		}
		warn!(cause = %cause, "Connection lost");
		// Called from the dispatcher itself, so detach instead of aborting
		drop(lifecycle.dispatcher.take());
		self.transport.release();
		let failed = self.tracker.fail_all(SessionError::ConnectionLost {
			cause: cause.clone(),
		});
		if failed > 0 {
			warn!(count = failed, "Pending deliveries failed by connection loss");
		}

		if self.config.reconnect.enabled {
			self.set_state(SessionState::Connecting);
			lifecycle.reconnector = Some(spawn_reconnector(self, cause));
		} else {
			self.set_state(SessionState::Disconnected);
			self.emit(SessionEvent::ConnectionLost(
				SessionError::ConnectionLost { cause },
			));
		}
	}

	async fn give_up(&self, attempts: u32, cause: String) {
		let mut lifecycle = self.lifecycle.lock().await;
		if self.state() != SessionState::Connecting {
			return;
		}
		drop(lifecycle.reconnector.take());
		error!(attempts, cause = %cause, "Reconnect attempts exhausted");
		self.set_state(SessionState::Disconnected);
		self.emit(SessionEvent::ConnectionLost(SessionError::ConnectionLost {
			cause,
		}));
	}
}

impl<T: TransportAdapter> Drop for SessionInner<T> {
	fn drop(&mut self) {
		let lifecycle = self.lifecycle.get_mut();
		for task in [lifecycle.dispatcher.take(), lifecycle.reconnector.take()]
			.into_iter()
			.flatten()
		{
			task.abort();
		}
		if self.state.borrow().is_connected() {
			error!(
				"SessionManager dropped without calling disconnect(). Please \
				 call disconnect() and await its completion before dropping."
			);
			self.transport.release();
		}
	}
}

fn spawn_dispatcher<T: TransportAdapter>(
	inner: &Arc<SessionInner<T>>,
	events: mpsc::Receiver<TransportEvent>,
) -> JoinHandle<()> {
	let sweep_interval = inner.config.settings.sweep_interval;
	tokio::spawn(run_dispatcher(Arc::downgrade(inner), events, sweep_interval))
}

/// Consumes transport events of one connection.
///
/// Ends on connection loss, when the event stream closes or when the session
/// is gone.
async fn run_dispatcher<T: TransportAdapter>(
	session: Weak<SessionInner<T>>,
	mut events: mpsc::Receiver<TransportEvent>,
	sweep_interval: Duration,
) {
	let mut sweep =
		time::interval_at(Instant::now() + sweep_interval, sweep_interval);
	sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);
	loop {
		tokio::select! {
			event = events.recv() => {
				let Some(inner) = session.upgrade() else { break };
				match event {
					| Some(TransportEvent::Message(message)) => {
						inner.dispatch(&message);
					}
					| Some(TransportEvent::DeliveryComplete(id)) => {
						if !inner.tracker.complete(id) {
							debug!(delivery_id = %id, "Acknowledgement without pending delivery");
						}
					}
					| Some(TransportEvent::DeliveryFailed { id, cause }) => {
						warn!(delivery_id = %id, cause = %cause, "Delivery failed");
						inner.tracker.fail(id, SessionError::DeliveryFailed { id, cause });
					}
					| Some(TransportEvent::ConnectionLost { cause }) => {
						inner.connection_lost(cause).await;
						break;
					}
					| None => {
						if inner.state().is_connected() {
							inner
								.connection_lost("transport event stream closed".to_string())
								.await;
						}
						break;
					}
				}
			}
			_ = sweep.tick() => {
				let Some(inner) = session.upgrade() else { break };
				let expired = inner.tracker.timeout_sweep(Instant::now());
				if !expired.is_empty() {
					debug!(count = expired.len(), "Expired pending deliveries");
				}
			}
		}
	}
	debug!("Dispatcher stopped");
}

fn spawn_reconnector<T: TransportAdapter>(
	inner: &Arc<SessionInner<T>>,
	cause: String,
) -> JoinHandle<()> {
	let backoff = Backoff::new(inner.config.reconnect.clone());
	tokio::spawn(run_reconnector(Arc::downgrade(inner), backoff, cause))
}

/// Retries the connection with backoff until it succeeds, the attempts run
/// out, or someone else takes over the lifecycle.
async fn run_reconnector<T: TransportAdapter>(
	session: Weak<SessionInner<T>>,
	mut backoff: Backoff,
	mut last_error: String,
) {
	loop {
		let Some(delay) = backoff.next_delay() else {
			if let Some(inner) = session.upgrade() {
				inner.give_up(backoff.attempt(), last_error).await;
			}
			return;
		};
		let attempt = backoff.attempt();
		{
			let Some(inner) = session.upgrade() else { return };
			info!(attempt, delay = ?delay, "Scheduling reconnect attempt");
			inner.emit(SessionEvent::Reconnecting { attempt, delay });
		}
		time::sleep(delay).await;

		let Some(inner) = session.upgrade() else { return };
		let mut lifecycle = inner.lifecycle.lock().await;
		if inner.state() != SessionState::Connecting {
			return;
		}
		match inner.establish(&mut lifecycle).await {
			| Ok(session_present) => {
				drop(lifecycle.reconnector.take());
				info!(attempt, session_present, "Reconnected");
				return;
			}
			| Err(err) => {
				warn!(attempt, error = %err, "Reconnect attempt failed");
				inner.set_state(SessionState::Connecting);
				last_error = err.to_string();
			}
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejected_indices_counts_missing_outcomes() {
		let outcomes = [
			SubscribeOutcome::Granted(QoS::AtLeastOnce),
			SubscribeOutcome::Rejected,
		];
		assert_eq!(rejected_indices(3, &outcomes), vec![1, 2]);
		assert!(rejected_indices(1, &outcomes).is_empty());
	}
}
