#![allow(missing_docs)]
use std::time::Duration;

use super::error::{HandlerError, SessionError};

/// Notifications published by a session.
///
/// Obtain a receiver with [`SessionManager::events`](crate::SessionManager::events).
/// Receivers that fall behind lose the oldest notifications.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
	/// A connect or reconnect completed
	Connected { session_present: bool },
	/// `disconnect()` finished
	Disconnected,
	/// A reconnect attempt is scheduled after `delay`
	Reconnecting { attempt: u32, delay: Duration },
	/// The connection dropped and the session settled in `Disconnected`
	ConnectionLost(SessionError),
	/// The broker refused filters while subscriptions were replayed
	ResubscribeRejected { filters: Vec<String> },
	/// A message handler returned an error or panicked
	HandlerFailed(HandlerError),
}

