#![allow(missing_docs)]
use std::collections::HashMap;

use arcstr::Substr;
use thiserror::Error;

use super::filter_segment::FilterSegment;
use super::topic_filter::TopicFilter;

/// Errors raised while updating the filter tree
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FilterTreeError {
	/// No node exists for the given segment of a filter
	#[error("No subscriptions under segment '{segment}' at level {level}")]
	MissingNode { segment: String, level: usize },
}

impl FilterTreeError {
	pub fn missing_node(segment: impl Into<String>, level: usize) -> Self {
		Self::MissingNode {
			segment: segment.into(),
			level,
		}
	}
}

pub trait IsEmpty {
	fn is_empty(&self) -> bool;
}

impl<K, V> IsEmpty for HashMap<K, V> {
	fn is_empty(&self) -> bool {
		self.is_empty()
	}
}

/// Node of the segment tree that maps topic filters to data.
///
/// Literal levels are children keyed by segment, `+` has a dedicated child
/// and `#` stores its data directly on the parent node, since it has to be
/// the last level of a filter.
#[derive(Debug)]
pub struct FilterTree<T> {
	/// Data for filters ending exactly at this node
	exact_data: Option<T>,

	/// Children for literal next levels
	literal_children: HashMap<Substr, FilterTree<T>>,

	/// Child for a `+` next level
	single_level_child: Option<Box<FilterTree<T>>>,

	/// Data for a `#` next level
	multi_level_data: Option<T>,
}

impl<T: Default + IsEmpty> Default for FilterTree<T> {
	fn default() -> Self {
		Self::new()
	}
}

impl<T: Default + IsEmpty> FilterTree<T> {
	pub fn new() -> Self {
		Self {
			exact_data: None,
			literal_children: HashMap::new(),
			single_level_child: None,
			multi_level_data: None,
		}
	}

	pub fn is_empty(&self) -> bool {
		self.exact_data.as_ref().is_none_or(T::is_empty)
			&& self.literal_children.is_empty()
			&& self.single_level_child.is_none()
			&& self.multi_level_data.as_ref().is_none_or(T::is_empty)
	}

	/// Finds or creates the data slot for a filter
	pub fn entry(&mut self, filter: &TopicFilter) -> &mut T {
		let mut node = self;
		for segment in filter.segments() {
			match segment {
				| FilterSegment::Literal(s) => {
					node = node.literal_children.entry(s.clone()).or_default()
				}
				| FilterSegment::SingleLevel => {
					node = node
						.single_level_child
						.get_or_insert_with(|| Box::new(FilterTree::new()))
				}
				| FilterSegment::MultiLevel => {
					return node.multi_level_data.get_or_insert_with(T::default);
				}
			}
		}
		node.exact_data.get_or_insert_with(T::default)
	}

	/// Returns the data slot for a filter if one exists
	pub fn get(&self, filter: &TopicFilter) -> Option<&T> {
		let mut node = self;
		for segment in filter.segments() {
			match segment {
				| FilterSegment::Literal(s) => {
					node = node.literal_children.get(s)?;
				}
				| FilterSegment::SingleLevel => {
					node = node.single_level_child.as_deref()?;
				}
				| FilterSegment::MultiLevel => {
					return node.multi_level_data.as_ref();
				}
			}
		}
		node.exact_data.as_ref()
	}

	/// Applies `f` to the data slot of a filter and prunes emptied nodes.
	///
	/// Returns `Ok(true)` when this node became empty and can be dropped by
	/// its parent.
	pub fn update<F>(
		&mut self,
		segments: &[FilterSegment],
		f: F,
	) -> Result<bool, FilterTreeError>
	where
		F: FnOnce(&mut T),
	{
		self.update_at(segments, 0, f)
	}

	fn update_at<F>(
		&mut self,
		segments: &[FilterSegment],
		level: usize,
		f: F,
	) -> Result<bool, FilterTreeError>
	where
		F: FnOnce(&mut T),
	{
		let Some((segment, rest)) = segments.split_first() else {
			let data = self
				.exact_data
				.as_mut()
				.ok_or_else(|| FilterTreeError::missing_node("", level))?;
			f(data);
			if data.is_empty() {
				self.exact_data = None;
			}
			return Ok(self.is_empty());
		};

		match segment {
			| FilterSegment::Literal(s) => {
				let child = self
					.literal_children
					.get_mut(s)
					.ok_or_else(|| FilterTreeError::missing_node(s.as_str(), level))?;
				if child.update_at(rest, level + 1, f)? {
					self.literal_children.remove(s);
				}
			}
			| FilterSegment::SingleLevel => {
				let child = self
					.single_level_child
					.as_mut()
					.ok_or_else(|| FilterTreeError::missing_node("+", level))?;
				if child.update_at(rest, level + 1, f)? {
					self.single_level_child = None;
				}
			}
			| FilterSegment::MultiLevel => {
				let data = self
					.multi_level_data
					.as_mut()
					.ok_or_else(|| FilterTreeError::missing_node("#", level))?;
				f(data);
				if data.is_empty() {
					self.multi_level_data = None;
				}
			}
		}
		Ok(self.is_empty())
	}

	fn collect_matching<'a>(&'a self, levels: &[&str], matches: &mut Vec<&'a T>) {
		// `#` also matches the parent level itself, so it is collected both at
		// the end of the topic and on the way down.
		if let Some(data) = &self.multi_level_data {
			matches.push(data);
		}
		match levels {
			| [] => {
				if let Some(data) = &self.exact_data {
					matches.push(data);
				}
			}
			| [level, rest @ ..] => {
				if let Some(child) = self.literal_children.get(*level) {
					child.collect_matching(rest, matches);
				}
				if let Some(child) = &self.single_level_child {
					child.collect_matching(rest, matches);
				}
			}
		}
	}

	/// Finds the data of every filter matching a concrete topic
	pub fn find(&self, topic: &str) -> Vec<&T> {
		let levels: Vec<&str> = topic.split('/').collect();
		let mut matches = Vec::new();
		self.collect_matching(&levels, &mut matches);
		matches
	}

	fn collect_values<'a>(&'a self, values: &mut Vec<&'a T>) {
		values.extend(self.exact_data.iter());
		values.extend(self.multi_level_data.iter());
		if let Some(child) = &self.single_level_child {
			child.collect_values(values);
		}
		for child in self.literal_children.values() {
			child.collect_values(values);
		}
	}

	/// Data of every filter stored in the tree
	pub fn values(&self) -> Vec<&T> {
		let mut values = Vec::new();
		self.collect_values(&mut values);
		values
	}
}
