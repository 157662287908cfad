#![allow(missing_docs)]
use std::fmt::{self, Display};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;
use tokio::sync::mpsc;

use super::error::TransportError;
use crate::topic::TopicFilter;

/// Identifier the transport assigns to every outbound publish.
///
/// Acknowledgement events carry the same id so the session can resolve the
/// matching pending delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeliveryId(u64);

impl DeliveryId {
	/// Wraps a raw id.
	pub const fn new(raw: u64) -> Self {
		Self(raw)
	}

	/// Raw numeric value.
	pub const fn get(self) -> u64 {
		self.0
	}
}

impl Display for DeliveryId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.0)
	}
}

/// Username and password sent with CONNECT
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
	pub username: String,
	pub password: String,
}

/// Everything a transport needs to open a connection
#[derive(Debug, Clone)]
pub struct ConnectOptions {
	pub client_id: String,
	pub host: String,
	pub port: u16,
	pub credentials: Option<Credentials>,
	pub clean_session: bool,
	pub keep_alive: Duration,
	pub tls: bool,
	/// PEM file with the CA certificates to trust instead of the platform
	/// roots. Only used with `tls`.
	pub ca_cert: Option<PathBuf>,
}

/// Result of a successful connect
#[derive(Debug)]
pub struct Established {
	/// Broker reported that it kept the previous session state
	pub session_present: bool,
	/// Inbound events for this connection; closes when the link ends
	pub events: mpsc::Receiver<TransportEvent>,
}

/// Message received from the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
	pub topic: ArcStr,
	pub payload: Bytes,
	pub qos: QoS,
	pub retained: bool,
}

/// Broker verdict for one filter of a subscribe request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubscribeOutcome {
	Granted(QoS),
	Rejected,
}

impl SubscribeOutcome {
	pub fn is_granted(&self) -> bool {
		matches!(self, SubscribeOutcome::Granted(_))
	}
}

/// Events a transport pushes to the session layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
	Message(InboundMessage),
	DeliveryComplete(DeliveryId),
	DeliveryFailed { id: DeliveryId, cause: String },
	ConnectionLost { cause: String },
}

/// Raw MQTT client operations the session layer is built on.
///
/// Implementations own the wire protocol. Acknowledgements for publishes
/// arrive later as [`TransportEvent::DeliveryComplete`] on the stream handed
/// out by [`connect`](TransportAdapter::connect); QoS 0 publishes produce no
/// acknowledgement event.
pub trait TransportAdapter: Send + Sync + 'static {
	/// Opens a connection and waits for the broker's CONNACK.
	fn connect(
		&self,
		options: &ConnectOptions,
	) -> impl Future<Output = Result<Established, TransportError>> + Send;

	/// Sends DISCONNECT and waits until the link has shut down.
	fn disconnect(
		&self,
	) -> impl Future<Output = Result<(), TransportError>> + Send;

	/// Hands a message to the transport and returns its delivery id.
	fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	) -> impl Future<Output = Result<DeliveryId, TransportError>> + Send;

	/// Subscribes to all filters in one request.
	///
	/// Returns one outcome per filter, in request order.
	fn subscribe(
		&self,
		filters: &[(TopicFilter, QoS)],
	) -> impl Future<Output = Result<Vec<SubscribeOutcome>, TransportError>> + Send;

	/// Unsubscribes from all filters and waits for the acknowledgement.
	fn unsubscribe(
		&self,
		filters: &[TopicFilter],
	) -> impl Future<Output = Result<(), TransportError>> + Send;

	/// Drops the underlying connection handle without any network exchange.
	///
	/// Must be idempotent.
	fn release(&self);
}
