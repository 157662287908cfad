#![allow(missing_docs)]
use std::any::Any;
use std::fmt::{self, Debug, Display};
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;

/// Return type of message handlers
pub type HandlerResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

type HandlerFn = dyn Fn(&str, &Bytes) -> HandlerResult + Send + Sync;

static NEXT_HANDLER_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a handler.
///
/// Every [`Handler`] gets a unique id on creation and keeps it across
/// clones, so the same handler can be registered on many filters and
/// removed again later.
#[derive(Debug, Eq, PartialEq, Hash, Copy, Clone, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl Display for HandlerId {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "HandlerId({})", self.0)
	}
}

/// Callback invoked with `(topic, payload)` for every matching message.
///
/// Cloning is cheap and preserves the identity.
#[derive(Clone)]
pub struct Handler {
	id: HandlerId,
	callback: Arc<HandlerFn>,
}

impl Handler {
	/// Wraps a fallible callback.
	pub fn new<F>(callback: F) -> Self
	where F: Fn(&str, &Bytes) -> HandlerResult + Send + Sync + 'static
	{
		Self {
			id: HandlerId(NEXT_HANDLER_ID.fetch_add(1, Ordering::Relaxed)),
			callback: Arc::new(callback),
		}
	}

	/// Wraps a callback that cannot fail.
	pub fn from_fn<F>(callback: F) -> Self
	where F: Fn(&str, &Bytes) + Send + Sync + 'static
	{
		Self::new(move |topic, payload| {
			callback(topic, payload);
			Ok(())
		})
	}

	pub fn id(&self) -> HandlerId {
		self.id
	}

	/// Runs the callback, turning both errors and panics into a reason.
	pub(crate) fn invoke(
		&self,
		topic: &str,
		payload: &Bytes,
	) -> Result<(), String> {
		let call = AssertUnwindSafe(|| (self.callback)(topic, payload));
		match catch_unwind(call) {
			| Ok(Ok(())) => Ok(()),
			| Ok(Err(err)) => Err(err.to_string()),
			| Err(panic) => Err(panic_reason(panic.as_ref())),
		}
	}
}

fn panic_reason(panic: &(dyn Any + Send)) -> String {
	if let Some(msg) = panic.downcast_ref::<&str>() {
		format!("handler panicked: {msg}")
	} else if let Some(msg) = panic.downcast_ref::<String>() {
		format!("handler panicked: {msg}")
	} else {
		"handler panicked".to_string()
	}
}

impl Debug for Handler {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Handler").field("id", &self.id).finish()
	}
}

impl PartialEq for Handler {
	fn eq(&self, other: &Self) -> bool {
		self.id == other.id
	}
}

impl Eq for Handler {}
