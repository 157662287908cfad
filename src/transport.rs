//! Transport collaborator module
//!
//! The session layer never touches MQTT packets itself. It drives a
//! [`TransportAdapter`], which owns the wire protocol, and consumes the typed
//! [`TransportEvent`]s the adapter emits.

/// Adapter trait and the values exchanged with it
pub mod adapter;
/// Transport error types
pub mod error;
/// Adapter backed by `rumqttc`
pub mod rumqtt;

pub use adapter::{
	ConnectOptions, Credentials, DeliveryId, Established, InboundMessage,
	SubscribeOutcome, TransportAdapter, TransportEvent,
};
pub use error::TransportError;
pub use rumqtt::{RumqttSettings, RumqttTransport};
