//! Concrete topics and the result of matching them against a pattern

use std::collections::HashMap;
use std::fmt;
use std::ops::Range;

use arcstr::{ArcStr, Substr};
use smallvec::SmallVec;
use thiserror::Error;

/// A concrete (wildcard free) topic split into its segments.
#[derive(Debug, Clone)]
pub struct TopicPath {
	/// Full topic string
	pub path: ArcStr,
	/// Segments of `path`, split on `/`
	pub segments: Vec<Substr>,
}

impl TopicPath {
	/// Splits `path` into segments.
	pub fn new(path: impl Into<ArcStr>) -> Self {
		let path = path.into();
		let segments: Vec<Substr> =
			path.split('/').map(|s| path.substr_from(s)).collect();
		Self { path, segments }
	}

	/// Returns the full topic string.
	pub fn path(&self) -> ArcStr {
		self.path.clone()
	}

	/// Returns the number of segments.
	pub fn len(&self) -> usize {
		self.segments.len()
	}

	/// Returns true if the topic has no segments.
	pub fn is_empty(&self) -> bool {
		self.segments.is_empty()
	}
}

impl fmt::Display for TopicPath {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "{}", self.path)
	}
}

/// Reason a topic did not match a pattern
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicMatchError {
	/// Topic has more segments than the pattern
	#[error("Topic has more segments than the pattern")]
	UnexpectedEndOfPattern,
	/// Pattern has more segments than the topic
	#[error("Topic has fewer segments than the pattern")]
	UnexpectedEndOfTopic,
	/// Literal segment differs
	#[error(
		"Segment mismatch at position {position}: expected '{expected}', \
		 found '{found}'"
	)]
	SegmentMismatch {
		/// Literal from the pattern
		expected: String,
		/// Segment from the topic
		found: String,
		/// Segment index
		position: usize,
	},
}

/// Successful match of a topic against a pattern.
///
/// Parameter values are kept as ranges of segments and sliced out of the
/// original topic string on demand.
pub struct TopicMatch {
	topic: TopicPath,
	named_params: SmallVec<[(Substr, Range<usize>); 4]>,
}

impl TopicMatch {
	pub(crate) fn from_match_result(
		topic: TopicPath,
		named_params: SmallVec<[(Substr, Range<usize>); 4]>,
	) -> Self {
		Self {
			topic,
			named_params,
		}
	}

	/// The matched topic.
	pub fn topic(&self) -> &TopicPath {
		&self.topic
	}

	fn get_param_range(&self, range: &Range<usize>) -> Substr {
		if range.is_empty() {
			self.topic.path.substr(0 .. 0)
		} else if range.len() == 1 {
			self.topic.segments[range.start].clone()
		} else {
			let start_segment = &self.topic.segments[range.start];
			let end_segment = &self.topic.segments[range.end - 1];

			let start_pos = start_segment.range().start;
			let end_pos = end_segment.range().end;

			self.topic.path.substr(start_pos .. end_pos)
		}
	}

	/// Returns the value bound to a named parameter.
	pub fn get_named_param(&self, name: &str) -> Option<Substr> {
		self.named_params
			.iter()
			.find(|(n, _)| n.as_str() == name)
			.map(|(_, range)| self.get_param_range(range))
	}

	/// Converts the match into its ordered parameter bindings.
	pub fn into_params(self) -> TopicParams {
		let params = self
			.named_params
			.iter()
			.map(|(name, range)| {
				(ArcStr::from(name.as_str()), self.get_param_range(range))
			})
			.collect();
		TopicParams { params }
	}
}

impl fmt::Debug for TopicMatch {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "TopicMatch {{ topic: {}", self.topic.path)?;
		if !self.named_params.is_empty() {
			write!(f, ", named_params: {{")?;
			for (i, (name, range)) in self.named_params.iter().enumerate() {
				if i > 0 {
					write!(f, ", ")?;
				}
				write!(f, "{}: {}", name, self.get_param_range(range))?;
			}
			write!(f, "}}")?;
		}
		write!(f, " }}")
	}
}

/// Named parameters extracted from a topic, in template order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TopicParams {
	params: SmallVec<[(ArcStr, Substr); 4]>,
}

impl TopicParams {
	/// Returns the value of the parameter `name`.
	pub fn get(&self, name: &str) -> Option<&str> {
		self.params
			.iter()
			.find(|(n, _)| n.as_str() == name)
			.map(|(_, value)| value.as_str())
	}

	/// Iterates `(name, value)` pairs in template order.
	pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
		self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
	}

	/// Number of extracted parameters.
	pub fn len(&self) -> usize {
		self.params.len()
	}

	/// True when the pattern had no named parameters.
	pub fn is_empty(&self) -> bool {
		self.params.is_empty()
	}

	/// Copies the parameters into a map.
	pub fn to_map(&self) -> HashMap<String, String> {
		self.iter()
			.map(|(n, v)| (n.to_string(), v.to_string()))
			.collect()
	}
}
