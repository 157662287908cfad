//! Session client module
//!
//! This module provides the session manager together with its
//! configuration, error types and notifications.

/// Session configuration
pub mod config;
/// Session error types
pub mod error;
/// Session notifications
pub mod events;
/// Outbound message type
pub mod message;
mod reconnect;
/// Session manager implementation
pub mod session;
/// Connection state
pub mod state;

// Re-export commonly used types for convenience
pub use config::{
	ReconnectPolicy, SessionConfig, SessionSettings, generate_client_id, qos,
};
pub use error::{ConfigError, ConnectError, HandlerError, SessionError};
pub use events::SessionEvent;
pub use message::OutboundMessage;
pub use session::SessionManager;
pub use state::SessionState;
