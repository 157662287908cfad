//! Topic handling module
//!
//! Parsing and validation of MQTT topic filters and topic names, plus the
//! segment tree used to resolve a concrete topic to every matching filter.

pub mod error;
pub mod filter_segment;
pub mod filter_tree;
/// Parsed topic filters
pub mod topic_filter;


pub use error::{TopicError, TopicNameError};
pub use error::{limits, validation};
pub use filter_segment::{FilterSegment, TopicFilterError};
pub use filter_tree::{FilterTree, FilterTreeError};
pub use topic_filter::TopicFilter;
