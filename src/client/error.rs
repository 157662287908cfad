#![allow(missing_docs)]
use thiserror::Error;

use crate::routing::HandlerId;
use crate::topic::{TopicError, TopicFilterError, TopicNameError};
use crate::transport::{DeliveryId, TransportError};

/// Invalid session configuration or call arguments
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
	#[error("Broker host must not be empty")]
	MissingHost,

	#[error("Client id must not be empty")]
	MissingClientId,

	#[error("Broker port must not be zero")]
	InvalidPort,

	#[error("{name} must be greater than zero")]
	ZeroTimeout { name: &'static str },

	#[error("Keep-alive must be zero or at least one second, got {millis}ms")]
	InvalidKeepAlive { millis: u64 },

	#[error("Invalid reconnect backoff: {reason}")]
	InvalidBackoff { reason: String },

	#[error("{name} must be greater than zero")]
	ZeroCapacity { name: &'static str },

	#[error("QoS level {level} is not valid, expected 0, 1 or 2")]
	InvalidQos { level: u8 },

	#[error("Invalid topic: {0}")]
	InvalidTopic(#[from] TopicNameError),

	#[error("Invalid broker URL: {0}")]
	InvalidUrl(String),

	#[error("Invalid value '{value}' for {name}")]
	InvalidEnv { name: &'static str, value: String },

	#[error("A CA certificate is set but TLS is disabled")]
	CaCertWithoutTls,
}

impl From<rumqttc::OptionError> for ConfigError {
	fn from(err: rumqttc::OptionError) -> Self {
		ConfigError::InvalidUrl(err.to_string())
	}
}

/// Reasons a connect attempt failed
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectError {
	#[error("Transport failed to connect: {0}")]
	Transport(#[from] TransportError),

	#[error("Connection establishment timed out after {timeout_millis}ms")]
	Timeout { timeout_millis: u64 },

	#[error("Failed to restore subscriptions: {reason}")]
	Replay { reason: String },
}

/// Errors returned by [`SessionManager`](crate::SessionManager) operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
	/// Configuration or argument validation failed
	#[error("Configuration error: {0}")]
	Config(#[from] ConfigError),

	/// Connection establishment failed
	#[error("Failed to establish connection: {0}")]
	Connect(#[from] ConnectError),

	/// Operation requires a connected session
	#[error("Session is not connected")]
	NotConnected,

	/// Topic filter failed validation
	#[error("Invalid topic filter: {0}")]
	InvalidFilter(#[from] TopicError),

	/// Broker refused some filters of a subscribe request
	#[error("Broker rejected subscription to {}", .filters.join(", "))]
	SubscribeRejected { filters: Vec<String> },

	/// No acknowledgement arrived before the deadline
	#[error("Delivery {id} was not acknowledged within {timeout_millis}ms")]
	DeliveryTimeout { id: DeliveryId, timeout_millis: u64 },

	/// Transport reported that the delivery failed
	#[error("Delivery {id} failed: {cause}")]
	DeliveryFailed { id: DeliveryId, cause: String },

	/// Connection dropped while the operation was in flight
	#[error("Connection lost: {cause}")]
	ConnectionLost { cause: String },

	/// A broker round trip took longer than allowed
	#[error("{operation} timed out after {timeout_millis}ms")]
	OperationTimeout {
		operation: &'static str,
		timeout_millis: u64,
	},

	/// Operation was cancelled by session teardown
	#[error("Operation aborted: {reason}")]
	Aborted { reason: String },

	/// Transport level failure
	#[error("Transport error: {0}")]
	Transport(TransportError),
}

impl From<TransportError> for SessionError {
	fn from(err: TransportError) -> Self {
		match err {
			| TransportError::NotConnected => SessionError::NotConnected,
			| other => SessionError::Transport(other),
		}
	}
}

impl From<TopicFilterError> for SessionError {
	fn from(err: TopicFilterError) -> Self {
		SessionError::InvalidFilter(err.into())
	}
}

impl From<TopicNameError> for SessionError {
	fn from(err: TopicNameError) -> Self {
		SessionError::Config(err.into())
	}
}

/// A message handler returned an error or panicked.
///
/// Reported through [`SessionEvent::HandlerFailed`](crate::SessionEvent),
/// never returned from API calls.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{handler} failed on topic '{topic}' (filter '{filter}'): {reason}")]
pub struct HandlerError {
	pub topic: String,
	pub filter: String,
	pub handler: HandlerId,
	pub reason: String,
}
