//! # MQTT Session
//!
//! A session layer for MQTT clients: connection lifecycle, filter-based
//! dispatch of inbound messages and delivery confirmation for outbound
//! publishes, built on top of a pluggable transport.
//!
//! ## Features
//!
//! - **Lifecycle Management**: Connect, disconnect and automatic reconnection
//!   with exponential backoff
//! - **Subscription Replay**: Subscriptions survive reconnects and are
//!   restored when the broker kept no session
//! - **Wildcard Dispatch**: Each subscription whose `+` or `#` filter
//!   matches fires exactly once per message
//! - **Delivery Tracking**: QoS 1/2 publishes resolve on the broker
//!   acknowledgement or time out
//! - **Pluggable Transport**: Implement [`TransportAdapter`] or use the
//!   bundled `rumqttc` adapter
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use mqtt_session::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = SessionConfig::from_url(
//!         "mqtt://broker.hivemq.com:1883?client_id=sensor-hub",
//!     )?;
//!     let session =
//!         SessionManager::connect_with_config(RumqttTransport::default(), config)
//!             .await?;
//!
//!     let handler = Handler::from_fn(|topic, payload| {
//!         println!("{topic}: {} bytes", payload.len());
//!     });
//!     session
//!         .subscribe(["sensors/#"], handler, QoS::AtLeastOnce)
//!         .await?;
//!
//!     session
//!         .publish("sensors/temp", "21.5", QoS::AtLeastOnce)
//!         .await?;
//!
//!     session.disconnect().await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Pattern Matching
//!
//! - `+` matches exactly one topic level (e.g., `sensors/+/temperature`)
//! - `#` matches the parent level and everything below it (e.g.,
//!   `sensors/#` matches `sensors` and `sensors/a/b`)

#![warn(missing_docs)]

// Core modules
pub mod client;
pub mod delivery;
pub mod routing;
pub mod topic;
pub mod transport;

// === Core Public API ===
pub use client::{
	OutboundMessage, ReconnectPolicy, SessionConfig, SessionError,
	SessionEvent, SessionManager, SessionSettings, SessionState,
};
pub use delivery::DeliveryHandle;
pub use routing::{Handler, HandlerId, HandlerResult};
pub use topic::TopicFilter;
pub use transport::{
	DeliveryId, InboundMessage, RumqttSettings, RumqttTransport,
	TransportAdapter, TransportEvent,
};

// Essential external types
pub use bytes::Bytes;
pub use rumqttc::QoS;

/// Result type alias for operations that may fail with SessionError
pub type Result<T> = std::result::Result<T, SessionError>;

/// Prelude module for convenient imports
///
/// ```rust
/// use mqtt_session::prelude::*;
/// ```
pub mod prelude {
	//! Essential types for most applications

	pub use crate::{
		Bytes, DeliveryHandle, Handler, OutboundMessage, QoS, ReconnectPolicy,
		Result, RumqttTransport, SessionConfig, SessionError, SessionEvent,
		SessionManager, SessionState,
	};
}

/// Types needed to implement a custom transport
///
/// ```rust
/// use mqtt_session::advanced::*;
/// ```
pub mod advanced {
	//! Transport contract and internals for custom integrations

	pub use crate::delivery::{DeliveryTracker, PendingDelivery};
	pub use crate::routing::{Subscription, SubscriptionRegistry};
	pub use crate::topic::{FilterSegment, FilterTree, limits, validation};
	pub use crate::transport::{
		ConnectOptions, Credentials, Established, SubscribeOutcome,
		TransportError,
	};
	pub use crate::{
		DeliveryId, InboundMessage, TopicFilter, TransportAdapter,
		TransportEvent,
	};
}

/// Error types used throughout the library
///
/// ```rust
/// use mqtt_session::errors::*;
/// ```
pub mod errors {
	//! All error types used in the library

	pub use crate::SessionError;
	pub use crate::client::{ConfigError, ConnectError, HandlerError};
	pub use crate::topic::{
		FilterTreeError, TopicError, TopicFilterError, TopicNameError,
	};
	pub use crate::transport::TransportError;
}
