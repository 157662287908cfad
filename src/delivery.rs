//! Outbound delivery tracking
//!
//! Publishes with QoS 1 or 2 stay pending until the broker acknowledges
//! them, fails them, or the acknowledgement timeout elapses.

/// Caller side handle of one publish
pub mod handle;
/// Pending delivery table
pub mod tracker;

pub use handle::DeliveryHandle;
pub use tracker::{DeliveryResult, DeliveryTracker, PendingDelivery};
