#![allow(missing_docs)]
use std::fmt::{self, Display};

/// Connection state of a session.
///
/// `Disconnected → Connecting → Connected → Disconnecting → Disconnected`,
/// plus `Connected → Connecting` while automatic reconnection runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
	#[default]
	Disconnected,
	Connecting,
	Connected,
	Disconnecting,
}

impl SessionState {
	pub fn is_connected(self) -> bool {
		self == SessionState::Connected
	}
}

impl Display for SessionState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let name = match self {
			| SessionState::Disconnected => "disconnected",
			| SessionState::Connecting => "connecting",
			| SessionState::Connected => "connected",
			| SessionState::Disconnecting => "disconnecting",
		};
		f.write_str(name)
	}
}
