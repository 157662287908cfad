//! In-memory transport and helpers shared by the integration tests
#![allow(dead_code)]

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use bytes::Bytes;
use mqtt_session::advanced::{
	ConnectOptions, Established, SubscribeOutcome, TransportError,
};
use mqtt_session::{
	DeliveryId, Handler, InboundMessage, QoS, SessionConfig, SessionEvent,
	SessionManager, SessionState, TopicFilter, TransportAdapter,
	TransportEvent,
};
use tokio::sync::{broadcast, mpsc};

/// How the stub answers the next connect call
#[derive(Debug, Clone)]
pub enum ConnectBehavior {
	Accept { session_present: bool },
	/// Accepts with `backlog` already queued on the new event stream
	AcceptWithBacklog {
		session_present: bool,
		backlog: Vec<InboundMessage>,
	},
	Fail(TransportError),
	Hang,
}

/// Every call the session made on the stub, in order
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
	Connect { client_id: String },
	Disconnect,
	Publish {
		topic: String,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	},
	Subscribe(Vec<(String, QoS)>),
	Unsubscribe(Vec<String>),
	Release,
}

struct StubState {
	connect_script: VecDeque<ConnectBehavior>,
	auto_ack: bool,
	rejected_filters: HashSet<String>,
	hang_subscribe: bool,
	hang_disconnect: bool,
	events: Option<mpsc::Sender<TransportEvent>>,
	next_id: u64,
	calls: Vec<Call>,
}

/// Transport double that records calls and lets tests inject events.
///
/// Connects succeed without a preserved session unless scripted otherwise.
/// QoS 1/2 publishes are acknowledged right away while `auto_ack` is on.
#[derive(Clone)]
pub struct StubTransport {
	state: Arc<Mutex<StubState>>,
}

impl Default for StubTransport {
	fn default() -> Self {
		Self::new()
	}
}

impl StubTransport {
	pub fn new() -> Self {
		Self {
			state: Arc::new(Mutex::new(StubState {
				connect_script: VecDeque::new(),
				auto_ack: true,
				rejected_filters: HashSet::new(),
				hang_subscribe: false,
				hang_disconnect: false,
				events: None,
				next_id: 1,
				calls: Vec::new(),
			})),
		}
	}

	fn lock(&self) -> MutexGuard<'_, StubState> {
		self.state.lock().unwrap()
	}

	pub fn script_connect(&self, behavior: ConnectBehavior) {
		self.lock().connect_script.push_back(behavior);
	}

	pub fn set_auto_ack(&self, auto_ack: bool) {
		self.lock().auto_ack = auto_ack;
	}

	pub fn reject_filter(&self, filter: &str) {
		self.lock().rejected_filters.insert(filter.to_string());
	}

	pub fn set_hang_subscribe(&self, hang: bool) {
		self.lock().hang_subscribe = hang;
	}

	pub fn set_hang_disconnect(&self, hang: bool) {
		self.lock().hang_disconnect = hang;
	}

	pub fn calls(&self) -> Vec<Call> {
		self.lock().calls.clone()
	}

	pub fn connect_count(&self) -> usize {
		self.count(|call| matches!(call, Call::Connect { .. }))
	}

	pub fn release_count(&self) -> usize {
		self.count(|call| matches!(call, Call::Release))
	}

	pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
		self.lock().calls.iter().filter(|call| pred(call)).count()
	}

	pub fn subscribe_calls(&self) -> Vec<Vec<(String, QoS)>> {
		self.lock()
			.calls
			.iter()
			.filter_map(|call| match call {
				| Call::Subscribe(filters) => Some(filters.clone()),
				| _ => None,
			})
			.collect()
	}

	pub fn unsubscribe_calls(&self) -> Vec<Vec<String>> {
		self.lock()
			.calls
			.iter()
			.filter_map(|call| match call {
				| Call::Unsubscribe(filters) => Some(filters.clone()),
				| _ => None,
			})
			.collect()
	}

	pub fn publish_calls(&self) -> Vec<Call> {
		self.lock()
			.calls
			.iter()
			.filter(|call| matches!(call, Call::Publish { .. }))
			.cloned()
			.collect()
	}

	pub fn is_linked(&self) -> bool {
		self.lock().events.is_some()
	}

	/// Pushes an event into the current connection's stream
	pub async fn inject(&self, event: TransportEvent) {
		let sender = self.lock().events.clone();
		sender
			.expect("stub is not connected")
			.send(event)
			.await
			.expect("session stopped reading events");
	}

	pub async fn deliver(&self, topic: &str, payload: &'static [u8]) {
		self.inject(TransportEvent::Message(InboundMessage {
			topic: topic.into(),
			payload: Bytes::from_static(payload),
			qos: QoS::AtLeastOnce,
			retained: false,
		}))
		.await;
	}

	pub async fn ack(&self, id: DeliveryId) {
		self.inject(TransportEvent::DeliveryComplete(id)).await;
	}

	/// Simulates a dropped network link
	pub async fn drop_connection(&self, cause: &str) {
		self.inject(TransportEvent::ConnectionLost {
			cause: cause.to_string(),
		})
		.await;
	}

	/// Closes the event stream without any ConnectionLost event
	pub fn close_stream(&self) {
		self.lock().events = None;
	}

	fn establish(
		&self,
		session_present: bool,
		backlog: Vec<InboundMessage>,
	) -> Established {
		let (tx, rx) = mpsc::channel(64);
		for message in backlog {
			tx.try_send(TransportEvent::Message(message))
				.expect("backlog exceeds the event channel");
		}
		self.lock().events = Some(tx);
		Established {
			session_present,
			events: rx,
		}
	}
}

impl TransportAdapter for StubTransport {
	async fn connect(
		&self,
		options: &ConnectOptions,
	) -> Result<Established, TransportError> {
		let behavior = {
			let mut state = self.lock();
			state.calls.push(Call::Connect {
				client_id: options.client_id.clone(),
			});
			state.connect_script.pop_front().unwrap_or(
				ConnectBehavior::Accept {
					session_present: false,
				},
			)
		};
		match behavior {
			| ConnectBehavior::Accept { session_present } => {
				Ok(self.establish(session_present, Vec::new()))
			}
			| ConnectBehavior::AcceptWithBacklog {
				session_present,
				backlog,
			} => Ok(self.establish(session_present, backlog)),
			| ConnectBehavior::Fail(err) => Err(err),
			| ConnectBehavior::Hang => std::future::pending().await,
		}
	}

	async fn disconnect(&self) -> Result<(), TransportError> {
		let hang = {
			let mut state = self.lock();
			state.calls.push(Call::Disconnect);
			state.hang_disconnect
		};
		if hang {
			std::future::pending::<()>().await;
		}
		self.lock().events = None;
		Ok(())
	}

	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	) -> Result<DeliveryId, TransportError> {
		let (id, ack_to) = {
			let mut state = self.lock();
			let Some(events) = state.events.clone() else {
				return Err(TransportError::NotConnected);
			};
			let id = DeliveryId::new(state.next_id);
			state.next_id += 1;
			state.calls.push(Call::Publish {
				topic: topic.to_string(),
				payload,
				qos,
				retain,
			});
			let ack_to = (state.auto_ack && qos != QoS::AtMostOnce)
				.then_some(events);
			(id, ack_to)
		};
		if let Some(events) = ack_to {
			// Acknowledged before the session registers the id
			let _ = events.send(TransportEvent::DeliveryComplete(id)).await;
		}
		Ok(id)
	}

	async fn subscribe(
		&self,
		filters: &[(TopicFilter, QoS)],
	) -> Result<Vec<SubscribeOutcome>, TransportError> {
		let (outcomes, hang) = {
			let mut state = self.lock();
			state.calls.push(Call::Subscribe(
				filters
					.iter()
					.map(|(filter, qos)| (filter.to_string(), *qos))
					.collect(),
			));
			if state.events.is_none() {
				return Err(TransportError::NotConnected);
			}
			let outcomes = filters
				.iter()
				.map(|(filter, qos)| {
					if state.rejected_filters.contains(filter.as_str()) {
						SubscribeOutcome::Rejected
					} else {
						SubscribeOutcome::Granted(*qos)
					}
				})
				.collect();
			(outcomes, state.hang_subscribe)
		};
		if hang {
			std::future::pending::<()>().await;
		}
		Ok(outcomes)
	}

	async fn unsubscribe(
		&self,
		filters: &[TopicFilter],
	) -> Result<(), TransportError> {
		let mut state = self.lock();
		state.calls.push(Call::Unsubscribe(
			filters.iter().map(ToString::to_string).collect(),
		));
		Ok(())
	}

	fn release(&self) {
		let mut state = self.lock();
		state.calls.push(Call::Release);
		state.events = None;
	}
}

pub const WAIT: Duration = Duration::from_secs(5);

/// Logs to the test writer when `RUST_LOG` is set
pub fn init_tracing() {
	if std::env::var("RUST_LOG").is_err() {
		return;
	}
	let _ = tracing_subscriber::fmt()
		.with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
		.with_test_writer()
		.try_init();
}

pub fn config() -> SessionConfig {
	init_tracing();
	SessionConfig::localhost("test-client")
}

pub async fn connected(
	stub: &StubTransport,
	config: SessionConfig,
) -> SessionManager<StubTransport> {
	SessionManager::connect_with_config(stub.clone(), config)
		.await
		.expect("connect should succeed")
}

/// Handler that forwards every call into a channel
pub fn recording_handler() -> (Handler, mpsc::UnboundedReceiver<(String, Bytes)>)
{
	let (tx, rx) = mpsc::unbounded_channel();
	let handler = Handler::from_fn(move |topic, payload| {
		let _ = tx.send((topic.to_string(), payload.clone()));
	});
	(handler, rx)
}

pub async fn next_message(
	rx: &mut mpsc::UnboundedReceiver<(String, Bytes)>,
) -> (String, Bytes) {
	tokio::time::timeout(WAIT, rx.recv())
		.await
		.expect("timed out waiting for a message")
		.expect("handler channel closed")
}

/// Waits for the first event matching `pred`, skipping others
pub async fn expect_event<F>(
	rx: &mut broadcast::Receiver<SessionEvent>,
	pred: F,
) -> SessionEvent
where
	F: Fn(&SessionEvent) -> bool,
{
	tokio::time::timeout(WAIT, async {
		loop {
			match rx.recv().await {
				| Ok(event) if pred(&event) => return event,
				| Ok(_) => continue,
				| Err(broadcast::error::RecvError::Lagged(_)) => continue,
				| Err(err) => panic!("event channel failed: {err}"),
			}
		}
	})
	.await
	.expect("timed out waiting for a session event")
}

pub async fn wait_for_state(
	session: &SessionManager<StubTransport>,
	expected: SessionState,
) {
	let mut changes = session.state_changes();
	tokio::time::timeout(WAIT, changes.wait_for(|state| *state == expected))
		.await
		.expect("timed out waiting for state")
		.expect("state channel closed");
}

/// Lets spawned tasks run until they block
pub async fn settle() {
	for _ in 0..10 {
		tokio::task::yield_now().await;
	}
}
