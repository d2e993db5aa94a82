use std::fmt;

use serde::{Deserialize, Serialize};

/// Ordered chain of identifiers from the root of the tier tree.
///
/// The empty chain is the root ("home"). Two paths are equal iff their segments are equal
/// element-wise, so `["1", "2"]` and `["2", "1"]` address different tiers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TierPath(Vec<String>);

impl TierPath {
	/// The root path.
	pub fn root() -> Self {
		Self(Vec::new())
	}

	/// Build a path from its segments.
	pub fn new(segments: impl IntoIterator<Item = impl Into<String>>) -> Self {
		Self(segments.into_iter().map(Into::into).collect())
	}

	/// Whether this is the root path.
	pub fn is_root(&self) -> bool {
		self.0.is_empty()
	}

	/// Depth of the addressed tier (root is 0).
	pub fn len(&self) -> usize {
		self.0.len()
	}

	/// Same as [`Self::is_root`].
	pub fn is_empty(&self) -> bool {
		self.0.is_empty()
	}

	/// The identifier segments.
	pub fn segments(&self) -> &[String] {
		&self.0
	}

	/// Last segment, `None` at the root.
	pub fn last(&self) -> Option<&str> {
		self.0.last().map(String::as_str)
	}

	/// Path of the child `id` below this one.
	pub fn child(&self, id: impl Into<String>) -> Self {
		let mut segments = self.0.clone();
		segments.push(id.into());
		Self(segments)
	}

	/// Path of the parent, `None` at the root.
	pub fn parent(&self) -> Option<Self> {
		let (_, parent) = self.0.split_last()?;
		Some(Self(parent.to_vec()))
	}

	/// Whether `prefix` is an ancestor of (or equal to) this path.
	pub fn starts_with(&self, prefix: &TierPath) -> bool {
		self.0.starts_with(&prefix.0)
	}

	/// Append a segment in place.
	pub fn push(&mut self, id: impl Into<String>) {
		self.0.push(id.into());
	}

	/// Remove and return the last segment.
	pub fn pop(&mut self) -> Option<String> {
		self.0.pop()
	}

	/// Keep only the first `len` segments.
	pub fn truncate(&mut self, len: usize) {
		self.0.truncate(len);
	}

	/// Remove every segment, making this the root path.
	pub fn clear(&mut self) {
		self.0.clear();
	}

	/// Iterate over the segments.
	pub fn iter(&self) -> std::slice::Iter<'_, String> {
		self.0.iter()
	}
}

impl fmt::Display for TierPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.0.is_empty() {
			return f.write_str("/");
		}
		for segment in &self.0 {
			write!(f, "/{segment}")?;
		}
		Ok(())
	}
}

impl<S: Into<String>> FromIterator<S> for TierPath {
	fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
		Self::new(iter)
	}
}

impl<S: Into<String>> Extend<S> for TierPath {
	fn extend<I: IntoIterator<Item = S>>(&mut self, iter: I) {
		self.0.extend(iter.into_iter().map(Into::into));
	}
}

impl From<Vec<String>> for TierPath {
	fn from(segments: Vec<String>) -> Self {
		Self(segments)
	}
}

impl From<&[&str]> for TierPath {
	fn from(segments: &[&str]) -> Self {
		Self::new(segments.iter().copied())
	}
}

impl<const N: usize> From<[&str; N]> for TierPath {
	fn from(segments: [&str; N]) -> Self {
		Self::new(segments)
	}
}

impl<'a> IntoIterator for &'a TierPath {
	type Item = &'a String;
	type IntoIter = std::slice::Iter<'a, String>;

	fn into_iter(self) -> Self::IntoIter {
		self.0.iter()
	}
}
