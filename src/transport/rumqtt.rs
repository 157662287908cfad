use std::collections::{HashMap, VecDeque};
use std::fs;
use std::future::Future;
use std::io::BufReader;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use arcstr::ArcStr;
use bytes::Bytes;
use futures::future::join_all;
use rumqttc::Packet::{self, Disconnect, Publish};
use rumqttc::{
	AsyncClient, ConnAck, ConnectReturnCode, EventLoop, MqttOptions, QoS,
	SubscribeFilter, SubscribeReasonCode, Transport,
};
use rumqttc::tokio_rustls::rustls::{ClientConfig, RootCertStore};
use rumqttc::{Event::Incoming, Event::Outgoing};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::adapter::{
	ConnectOptions, DeliveryId, Established, InboundMessage, SubscribeOutcome,
	TransportAdapter, TransportEvent,
};
use super::error::TransportError;
use crate::topic::TopicFilter;

/// Channel sizes used by [`RumqttTransport`]
#[derive(Debug, Clone)]
pub struct RumqttSettings {
	/// Capacity of the rumqttc request channel
	pub event_loop_capacity: usize,
	/// Capacity of the channel carrying [`TransportEvent`]s to the session
	pub event_channel_capacity: usize,
}

impl Default for RumqttSettings {
	fn default() -> Self {
		Self {
			event_loop_capacity: 10,
			event_channel_capacity: 100,
		}
	}
}

/// [`TransportAdapter`] backed by `rumqttc::AsyncClient`.
///
/// Every connect builds a fresh client and event loop. The event loop runs
/// in its own task and translates packets into [`TransportEvent`]s.
pub struct RumqttTransport {
	settings: RumqttSettings,
	link: Mutex<Option<Link>>,
	next_delivery_id: AtomicU64,
}

/// One live rumqttc connection
struct Link {
	client: AsyncClient,
	requests: Arc<Mutex<RequestBook>>,
	request_order: Arc<tokio::sync::Mutex<()>>,
	closed: watch::Receiver<bool>,
	event_loop: JoinHandle<()>,
}

/// Cloned handles of a link, usable without holding the link lock
struct LinkHandles {
	client: AsyncClient,
	requests: Arc<Mutex<RequestBook>>,
	request_order: Arc<tokio::sync::Mutex<()>>,
	closed: watch::Receiver<bool>,
}

impl LinkHandles {
	fn book(&self) -> MutexGuard<'_, RequestBook> {
		lock_book(&self.requests)
	}
}

type SubAckSender = oneshot::Sender<Vec<SubscribeOutcome>>;

/// Correlates requests with packet ids.
///
/// rumqttc assigns packet ids inside its event loop and reports them through
/// `Outgoing` notifications in request order, so requests wait in FIFO
/// queues until their packet id is known.
#[derive(Default)]
struct RequestBook {
	queued_publishes: VecDeque<(DeliveryId, QoS)>,
	queued_subscribes: VecDeque<SubAckSender>,
	queued_unsubscribes: VecDeque<oneshot::Sender<()>>,
	publishes: HashMap<u16, DeliveryId>,
	subscribes: HashMap<u16, SubAckSender>,
	unsubscribes: HashMap<u16, oneshot::Sender<()>>,
}

fn lock_book(book: &Mutex<RequestBook>) -> MutexGuard<'_, RequestBook> {
	book.lock().unwrap_or_else(PoisonError::into_inner)
}

impl Default for RumqttTransport {
	fn default() -> Self {
		Self::new(RumqttSettings::default())
	}
}

impl RumqttTransport {
	pub fn new(settings: RumqttSettings) -> Self {
		Self {
			settings,
			link: Mutex::new(None),
			next_delivery_id: AtomicU64::new(1),
		}
	}

	fn handles(&self) -> Result<LinkHandles, TransportError> {
		let link = self.link.lock().unwrap_or_else(PoisonError::into_inner);
		let link = link.as_ref().ok_or(TransportError::NotConnected)?;
		Ok(LinkHandles {
			client: link.client.clone(),
			requests: link.requests.clone(),
			request_order: link.request_order.clone(),
			closed: link.closed.clone(),
		})
	}

	async fn establish_connection(
		mut event_loop: EventLoop,
	) -> Result<(EventLoop, bool), TransportError> {
		loop {
			match event_loop.poll().await {
				| Ok(Incoming(Packet::ConnAck(ConnAck {
					code,
					session_present,
				}))) => {
					if code == ConnectReturnCode::Success {
						debug!(
							session_present,
							"MQTT connection established successfully"
						);
						return Ok((event_loop, session_present));
					}
					debug!(code = ?code, "MQTT connection rejected by broker");
					return Err(TransportError::Rejected {
						reason: format!("{code:?}"),
					});
				}
				| Ok(notification) => {
					debug!(notification = ?notification, "Bootstrap phase notification");
				}
				| Err(connection_err) => {
					debug!(error = %connection_err, "MQTT connection error during bootstrap phase");
					return Err(connection_err.into());
				}
			}
		}
	}

	/// Drives the rumqttc event loop until the connection ends.
	///
	/// Terminates on a Disconnect packet in either direction or on the first
	/// poll error. Reconnection is the session's job, so the loop never
	/// retries by itself.
	async fn run(
		mut event_loop: EventLoop,
		requests: Arc<Mutex<RequestBook>>,
		events: mpsc::Sender<TransportEvent>,
		closed: watch::Sender<bool>,
	) {
		loop {
			let event = match event_loop.poll().await {
				| Ok(Incoming(Publish(p))) => {
					debug!(topic = %p.topic, payload_size = p.payload.len(), "Received MQTT message");
					Some(TransportEvent::Message(InboundMessage {
						topic: ArcStr::from(p.topic),
						payload: p.payload,
						qos: p.qos,
						retained: p.retain,
					}))
				}
				| Ok(Incoming(Packet::PubAck(ack))) => {
					take_delivery(&requests, ack.pkid)
						.map(TransportEvent::DeliveryComplete)
				}
				| Ok(Incoming(Packet::PubComp(ack))) => {
					take_delivery(&requests, ack.pkid)
						.map(TransportEvent::DeliveryComplete)
				}
				| Ok(Incoming(Packet::SubAck(ack))) => {
					let waiter = lock_book(&requests).subscribes.remove(&ack.pkid);
					match waiter {
						| Some(waiter) => {
							let outcomes = ack
								.return_codes
								.iter()
								.map(|code| match code {
									| SubscribeReasonCode::Success(qos) => {
										SubscribeOutcome::Granted(*qos)
									}
									| SubscribeReasonCode::Failure => {
										SubscribeOutcome::Rejected
									}
								})
								.collect();
							let _ = waiter.send(outcomes);
						}
						| None => {
							warn!(pkid = ack.pkid, "SubAck for unknown request")
						}
					}
					None
				}
				| Ok(Incoming(Packet::UnsubAck(ack))) => {
					let waiter =
						lock_book(&requests).unsubscribes.remove(&ack.pkid);
					if let Some(waiter) = waiter {
						let _ = waiter.send(());
					}
					None
				}
				| Ok(Outgoing(rumqttc::Outgoing::Publish(pkid))) => {
					let mut book = lock_book(&requests);
					match book.queued_publishes.pop_front() {
						| Some((_, QoS::AtMostOnce)) => {}
						| Some((id, _)) => {
							book.publishes.insert(pkid, id);
						}
						| None => {
							// Retransmission of an already tracked publish
							debug!(pkid, "Outgoing publish without queued request");
						}
					}
					None
				}
				| Ok(Outgoing(rumqttc::Outgoing::Subscribe(pkid))) => {
					let mut book = lock_book(&requests);
					if let Some(waiter) = book.queued_subscribes.pop_front() {
						book.subscribes.insert(pkid, waiter);
					}
					None
				}
				| Ok(Outgoing(rumqttc::Outgoing::Unsubscribe(pkid))) => {
					let mut book = lock_book(&requests);
					if let Some(waiter) = book.queued_unsubscribes.pop_front() {
						book.unsubscribes.insert(pkid, waiter);
					}
					None
				}
				| Ok(Incoming(Disconnect)) => {
					info!("Received MQTT Disconnect packet from server");
					let lost = TransportEvent::ConnectionLost {
						cause: "broker sent DISCONNECT".to_string(),
					};
					let _ = events.send(lost).await;
					break;
				}
				| Ok(Outgoing(rumqttc::Outgoing::Disconnect)) => {
					info!("Sent MQTT Disconnect packet to server");
					break;
				}
				| Ok(notification) => {
					debug!(notification = ?notification, "Received OTHER MQTT notification");
					None
				}
				| Err(err) => {
					error!(error = %err, "MQTT event loop error");
					let lost = TransportEvent::ConnectionLost {
						cause: err.to_string(),
					};
					let _ = events.send(lost).await;
					break;
				}
			};

			if let Some(event) = event {
				if events.send(event).await.is_err() {
					warn!("Session event channel closed, stopping event loop");
					break;
				}
			}
		}
		// Dropping the waiters fails every request still waiting for an answer
		*lock_book(&requests) = RequestBook::default();
		let _ = closed.send(true);
		info!("MQTT event loop terminated");
	}
}

fn take_delivery(
	requests: &Mutex<RequestBook>,
	pkid: u16,
) -> Option<DeliveryId> {
	let id = lock_book(requests).publishes.remove(&pkid);
	if id.is_none() {
		warn!(pkid, "Acknowledgement for unknown publish");
	}
	id
}

/// Resolves `response`, or fails once the event loop has stopped.
async fn until_closed<F: Future>(
	response: F,
	mut closed: watch::Receiver<bool>,
) -> Result<F::Output, TransportError> {
	tokio::select! {
		biased;
		output = response => Ok(output),
		// An error means the loop task is gone as well
		_ = closed.wait_for(|closed| *closed) => {
			debug!("Connection closed before the broker answered");
			Err(TransportError::ResponseLost)
		}
	}
}

/// TLS transport trusting either the platform roots or the CAs in `ca_cert`
fn tls_transport(
	ca_cert: Option<&Path>,
) -> Result<Transport, TransportError> {
	let Some(path) = ca_cert else {
		return Ok(Transport::tls_with_default_config());
	};
	let tls_error = |reason: String| {
		TransportError::Tls(format!("{}: {reason}", path.display()))
	};

	let pem = fs::read(path).map_err(|err| tls_error(err.to_string()))?;
	let mut reader = BufReader::new(&pem[..]);
	let mut roots = RootCertStore::empty();
	for cert in rustls_pemfile::certs(&mut reader) {
		let cert = cert.map_err(|err| tls_error(err.to_string()))?;
		roots.add(cert).map_err(|err| tls_error(err.to_string()))?;
	}
	if roots.is_empty() {
		return Err(tls_error("no certificates found".to_string()));
	}
	debug!(
		ca_cert = %path.display(),
		certificates = roots.len(),
		"Loaded CA certificates"
	);

	let config = ClientConfig::builder()
		.with_root_certificates(roots)
		.with_no_client_auth();
	Ok(Transport::tls_with_config(config.into()))
}

fn mqtt_options(
	options: &ConnectOptions,
) -> Result<MqttOptions, TransportError> {
	let mut mqtt = MqttOptions::new(
		options.client_id.as_str(),
		options.host.as_str(),
		options.port,
	);
	mqtt.set_keep_alive(options.keep_alive)
		.set_clean_session(options.clean_session);
	if let Some(credentials) = &options.credentials {
		mqtt.set_credentials(
			credentials.username.as_str(),
			credentials.password.as_str(),
		);
	}
	if options.tls {
		mqtt.set_transport(tls_transport(options.ca_cert.as_deref())?);
	}
	Ok(mqtt)
}

impl TransportAdapter for RumqttTransport {
	async fn connect(
		&self,
		options: &ConnectOptions,
	) -> Result<Established, TransportError> {
		self.release();
		let (client, event_loop) = AsyncClient::new(
			mqtt_options(options)?,
			self.settings.event_loop_capacity,
		);
		let (event_loop, session_present) =
			Self::establish_connection(event_loop).await?;

		let (events_tx, events_rx) =
			mpsc::channel(self.settings.event_channel_capacity);
		let (closed_tx, closed_rx) = watch::channel(false);
		let requests = Arc::new(Mutex::new(RequestBook::default()));
		let event_loop = tokio::spawn(Self::run(
			event_loop,
			requests.clone(),
			events_tx,
			closed_tx,
		));

		let link = Link {
			client,
			requests,
			request_order: Arc::new(tokio::sync::Mutex::new(())),
			closed: closed_rx,
			event_loop,
		};
		*self.link.lock().unwrap_or_else(PoisonError::into_inner) = Some(link);
		Ok(Established {
			session_present,
			events: events_rx,
		})
	}

	async fn disconnect(&self) -> Result<(), TransportError> {
		let link = self.handles()?;
		link.client.disconnect().await?;
		let mut closed = link.closed;
		// An error means the loop already ended and dropped the sender
		let _ = closed.wait_for(|closed| *closed).await;
		Ok(())
	}

	async fn publish(
		&self,
		topic: &str,
		payload: Bytes,
		qos: QoS,
		retain: bool,
	) -> Result<DeliveryId, TransportError> {
		let link = self.handles()?;
		let id =
			DeliveryId::new(self.next_delivery_id.fetch_add(1, Ordering::Relaxed));
		let _order = link.request_order.lock().await;
		link.book().queued_publishes.push_back((id, qos));
		if let Err(err) =
			link.client.publish_bytes(topic, qos, retain, payload).await
		{
			link.book().queued_publishes.pop_back();
			return Err(err.into());
		}
		Ok(id)
	}

	async fn subscribe(
		&self,
		filters: &[(TopicFilter, QoS)],
	) -> Result<Vec<SubscribeOutcome>, TransportError> {
		let link = self.handles()?;
		let (tx, rx) = oneshot::channel();
		{
			let _order = link.request_order.lock().await;
			link.book().queued_subscribes.push_back(tx);
			let request = filters.iter().map(|(filter, qos)| {
				SubscribeFilter::new(filter.as_str().to_string(), *qos)
			});
			if let Err(err) = link.client.subscribe_many(request).await {
				link.book().queued_subscribes.pop_back();
				return Err(err.into());
			}
		}
		until_closed(rx, link.closed)
			.await?
			.map_err(|_| TransportError::ResponseLost)
	}

	async fn unsubscribe(
		&self,
		filters: &[TopicFilter],
	) -> Result<(), TransportError> {
		let link = self.handles()?;
		let mut acks = Vec::with_capacity(filters.len());
		{
			let _order = link.request_order.lock().await;
			for filter in filters {
				let (tx, rx) = oneshot::channel();
				link.book().queued_unsubscribes.push_back(tx);
				if let Err(err) = link.client.unsubscribe(filter.as_str()).await
				{
					link.book().queued_unsubscribes.pop_back();
					return Err(err.into());
				}
				acks.push(rx);
			}
		}
		for ack in until_closed(join_all(acks), link.closed).await? {
			ack.map_err(|_| TransportError::ResponseLost)?;
		}
		Ok(())
	}

	fn release(&self) {
		let link = self
			.link
			.lock()
			.unwrap_or_else(PoisonError::into_inner)
			.take();
		if let Some(link) = link {
			link.event_loop.abort();
			debug!("rumqttc link released");
		}
	}
}
