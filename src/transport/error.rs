use thiserror::Error;

/// Failures reported by a transport adapter
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
	/// Network level failure (socket, TLS, protocol violation)
	#[error("Network connection failed: {0}")]
	Network(String),

	/// Broker answered CONNECT with a non-success code
	#[error("Broker rejected connection: {reason}")]
	Rejected {
		/// Broker supplied reason
		reason: String,
	},

	/// TLS settings could not be turned into a client configuration
	#[error("TLS setup failed: {0}")]
	Tls(String),

	/// A request could not be handed to the underlying client
	#[error("Client request failed: {0}")]
	Request(String),

	/// Operation issued while the transport holds no connection
	#[error("Transport is not connected")]
	NotConnected,

	/// The response channel closed before an acknowledgement arrived
	#[error("Acknowledgement was lost before it arrived")]
	ResponseLost,
}

impl From<rumqttc::ClientError> for TransportError {
	fn from(err: rumqttc::ClientError) -> Self {
		TransportError::Request(err.to_string())
	}
}

impl From<rumqttc::ConnectionError> for TransportError {
	fn from(err: rumqttc::ConnectionError) -> Self {
		TransportError::Network(err.to_string())
	}
}
