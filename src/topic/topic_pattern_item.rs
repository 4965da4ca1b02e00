//! Topic template segment types and parsing

use std::convert::TryFrom;

use arcstr::Substr;
use thiserror::Error;

/// Error types for topic template parsing
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TopicPatternError {
	/// Hash wildcard (#) used not at the end of the pattern
	#[error(
		"Invalid topic pattern '{pattern}': # wildcard can only be the last \
		 segment"
	)]
	HashPosition {
		/// The invalid pattern
		pattern: String,
	},

	/// Wildcard characters (+ or #) used incorrectly
	#[error("Invalid wildcard usage: {usage}")]
	WildcardUsage {
		/// Description of invalid usage
		usage: String,
	},

	/// The same parameter name appears twice in one template
	#[error("Duplicate parameter name '{name}' in pattern '{pattern}'")]
	DuplicateParameter {
		/// Repeated parameter name
		name: String,
		/// The invalid pattern
		pattern: String,
	},

	/// Empty topic is not valid
	#[error("Topic pattern cannot be empty")]
	EmptyTopic,
}

impl TopicPatternError {
	/// Creates a new HashPosition error
	pub fn hash_position(pattern: impl Into<String>) -> Self {
		Self::HashPosition {
			pattern: pattern.into(),
		}
	}

	/// Creates a new WildcardUsage error
	pub fn wildcard_usage(usage: impl Into<String>) -> Self {
		Self::WildcardUsage {
			usage: usage.into(),
		}
	}

	/// Creates a new DuplicateParameter error
	pub fn duplicate_parameter(
		name: impl Into<String>,
		pattern: impl Into<String>,
	) -> Self {
		Self::DuplicateParameter {
			name: name.into(),
			pattern: pattern.into(),
		}
	}
}

/// Topic template segment: literal string or wildcard
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TopicPatternItem {
	/// Literal string segment
	Str(Substr),
	/// Single-level wildcard `+`, or named as `{param}` / `+param`
	Plus(Option<Substr>),
	/// Multi-level wildcard `#`, or named as `{param:#}` / `#param`
	Hash(Option<Substr>),
}

impl TopicPatternItem {
	/// Returns the subscription filter form of the item.
	pub fn as_str(&self) -> &str {
		match self {
			| TopicPatternItem::Str(s) => s,
			| TopicPatternItem::Plus(_) => "+",
			| TopicPatternItem::Hash(_) => "#",
		}
	}

	/// Returns parameter name for named wildcards.
	pub fn param_name(&self) -> Option<Substr> {
		match self {
			| TopicPatternItem::Plus(Some(name))
			| TopicPatternItem::Hash(Some(name)) => Some(name.clone()),
			| _ => None,
		}
	}
}

impl std::fmt::Display for TopicPatternItem {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		write!(f, "{}", self.as_str())
	}
}

fn named(item: &Substr, inner: &str) -> Result<Substr, TopicPatternError> {
	if inner.is_empty() || inner.contains(['+', '#', '{', '}']) {
		return Err(TopicPatternError::wildcard_usage(item.as_str()));
	}
	Ok(item.substr_from(inner))
}

impl TryFrom<Substr> for TopicPatternItem {
	type Error = TopicPatternError;

	fn try_from(item: Substr) -> Result<Self, Self::Error> {
		let res = match item.as_str() {
			| "+" => TopicPatternItem::Plus(None),
			| "#" => TopicPatternItem::Hash(None),
			| s if s.starts_with('{') && s.ends_with(":#}") => {
				let inner = &s[1 .. s.len() - 3];
				TopicPatternItem::Hash(Some(named(&item, inner)?))
			}
			| s if s.starts_with('{') && s.ends_with('}') => {
				let inner = &s[1 .. s.len() - 1];
				TopicPatternItem::Plus(Some(named(&item, inner)?))
			}
			| s if s.starts_with('+') => {
				TopicPatternItem::Plus(Some(named(&item, &s[1 ..])?))
			}
			| s if s.starts_with('#') => {
				TopicPatternItem::Hash(Some(named(&item, &s[1 ..])?))
			}
			| s if s.contains(['+', '#']) => {
				return Err(TopicPatternError::wildcard_usage(s));
			}
			| _ => TopicPatternItem::Str(item),
		};
		Ok(res)
	}
}
