use std::collections::HashSet;
use std::convert::TryFrom;

use arcstr::{ArcStr, Substr};
use smallvec::SmallVec;

use super::topic_match::{TopicMatch, TopicMatchError, TopicParams, TopicPath};
use super::topic_pattern_item::{TopicPatternError, TopicPatternItem};

/// Compiled topic template with wildcard and named parameter support.
///
/// ```rust
/// use mqtt_component::TopicPatternPath;
///
/// let pattern = TopicPatternPath::new("devices/{device}/status").unwrap();
/// assert_eq!(pattern.mqtt_pattern(), "devices/+/status");
///
/// let params = pattern.extract("devices/lamp/status").unwrap();
/// assert_eq!(params.get("device"), Some("lamp"));
/// ```
#[derive(Debug, Clone)]
pub struct TopicPatternPath {
	template_pattern: ArcStr, // original template "sensors/{id}/data"
	mqtt_topic_subscription: ArcStr, // filter with wildcards "sensors/+/data"
	segments: Vec<TopicPatternItem>,
}

impl TopicPatternPath {
	/// Compiles a topic template.
	///
	/// Fails when the template is empty, when `#` is not the last segment,
	/// when wildcard characters appear inside a literal segment, or when a
	/// parameter name is empty or repeated.
	pub fn new(
		topic_pattern: impl Into<ArcStr>,
	) -> Result<Self, TopicPatternError> {
		let topic_pattern = topic_pattern.into();
		if topic_pattern.is_empty() || topic_pattern.trim().is_empty() {
			return Err(TopicPatternError::EmptyTopic);
		}

		let segments: Vec<TopicPatternItem> = topic_pattern
			.split('/')
			.map(|s| topic_pattern.substr_from(s))
			.map(TopicPatternItem::try_from)
			.collect::<Result<_, _>>()?;

		let mut seen_names = HashSet::new();
		for segment in &segments {
			if let Some(name) = segment.param_name() {
				if !seen_names.insert(name.clone()) {
					return Err(TopicPatternError::duplicate_parameter(
						name.as_str(),
						topic_pattern.as_str(),
					));
				}
			}
		}

		if let Some(hash_pos) = segments
			.iter()
			.position(|s| matches!(*s, TopicPatternItem::Hash(_)))
		{
			if hash_pos != segments.len() - 1 {
				return Err(TopicPatternError::hash_position(
					topic_pattern.as_str(),
				));
			}
		}

		let filter = segments
			.iter()
			.map(TopicPatternItem::as_str)
			.collect::<Vec<_>>()
			.join("/");

		Ok(Self {
			template_pattern: topic_pattern,
			mqtt_topic_subscription: ArcStr::from(filter),
			segments,
		})
	}

	/// Returns the filter with plain MQTT wildcards used for broker
	/// subscription.
	pub fn mqtt_pattern(&self) -> ArcStr {
		self.mqtt_topic_subscription.clone()
	}

	/// Returns the original template.
	pub fn topic_pattern(&self) -> ArcStr {
		self.template_pattern.clone()
	}

	/// Returns parameter names in template order.
	pub fn param_names(&self) -> Vec<Substr> {
		self.segments.iter().filter_map(|s| s.param_name()).collect()
	}

	/// Returns true if `topic` matches this pattern.
	pub fn matches(&self, topic: &str) -> bool {
		self.try_match(&TopicPath::new(topic)).is_ok()
	}

	/// Matches `topic` and returns its named parameters, or `None` when the
	/// topic does not match. Patterns without named parameters yield an
	/// empty set of parameters on a match.
	pub fn extract(&self, topic: &str) -> Option<TopicParams> {
		self.try_match(&TopicPath::new(topic))
			.ok()
			.map(TopicMatch::into_params)
	}

	/// Matches a topic against this pattern and records the segment range
	/// of every named parameter.
	///
	/// `+` takes exactly one segment. `#` takes every remaining segment and
	/// needs at least one.
	pub fn try_match(
		&self,
		topic: &TopicPath,
	) -> Result<TopicMatch, TopicMatchError> {
		let found = &topic.segments;
		let mut named_params = SmallVec::new();

		for (position, item) in self.segments.iter().enumerate() {
			let segment =
				found.get(position).ok_or(TopicMatchError::UnexpectedEndOfTopic)?;
			let span = match item {
				| TopicPatternItem::Str(literal) => {
					if segment != literal {
						return Err(TopicMatchError::SegmentMismatch {
							expected: literal.to_string(),
							found: segment.to_string(),
							position,
						});
					}
					continue;
				}
				| TopicPatternItem::Plus(name) => (name, position .. position + 1),
				| TopicPatternItem::Hash(name) => (name, position .. found.len()),
			};
			if let (Some(name), range) = span {
				named_params.push((name.clone(), range));
			}
		}

		let consumed = match self.segments.last() {
			| Some(TopicPatternItem::Hash(_)) => found.len(),
			| _ => self.segments.len(),
		};
		if found.len() > consumed {
			return Err(TopicMatchError::UnexpectedEndOfPattern);
		}
		Ok(TopicMatch::from_match_result(topic.clone(), named_params))
	}
}

impl std::fmt::Display for TopicPatternPath {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.template_pattern)
	}
}

impl TryFrom<String> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<&str> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: &str) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}

impl TryFrom<ArcStr> for TopicPatternPath {
	type Error = TopicPatternError;

	fn try_from(value: ArcStr) -> Result<Self, Self::Error> {
		Self::new(value)
	}
}
