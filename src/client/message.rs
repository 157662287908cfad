#![allow(missing_docs)]
use arcstr::ArcStr;
use bytes::Bytes;
use rumqttc::QoS;

/// Message to publish.
///
/// Without an explicit QoS the session's default QoS is used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
	pub topic: ArcStr,
	pub payload: Bytes,
	pub qos: Option<QoS>,
	pub retain: bool,
}

impl OutboundMessage {
	pub fn new(topic: impl Into<ArcStr>, payload: impl Into<Bytes>) -> Self {
		Self {
			topic: topic.into(),
			payload: payload.into(),
			qos: None,
			retain: false,
		}
	}

	pub fn with_qos(mut self, qos: QoS) -> Self {
		self.qos = Some(qos);
		self
	}

	/// Ask the broker to keep this message for future subscribers
	pub fn retained(mut self, retain: bool) -> Self {
		self.retain = retain;
		self
	}
}
