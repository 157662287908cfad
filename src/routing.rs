//! Local subscription routing
//!
//! Keeps every (filter, handler) pair the application registered and
//! resolves concrete topics to the handlers that must receive them.

/// Callback handles and their identity
pub mod handler;
/// Filter-indexed subscription registry
pub mod registry;

#[cfg(test)]
mod registry_tests;

pub use handler::{Handler, HandlerId, HandlerResult};
pub use registry::{Subscription, SubscriptionRegistry};
