//! Component-scoped topic conventions
//!
//! Topics supplied by callers may contain [`COMPONENT_ID_PLACEHOLDER`], which
//! is replaced with the live component id before compilation or
//! transmission. Settings travel on `sys/<componentId>/<property>`.

/// Token replaced with the component id in caller supplied topics.
pub const COMPONENT_ID_PLACEHOLDER: &str = "{$componentId}";

/// First segment of every settings topic.
pub const SETTINGS_PREFIX: &str = "sys";

/// Replaces every placeholder occurrence in `topic` with `component_id`.
pub fn substitute_component_id(topic: &str, component_id: &str) -> String {
	topic.replace(COMPONENT_ID_PLACEHOLDER, component_id)
}

/// Builds the settings topic of `property` for `component_id`.
pub fn settings_topic(component_id: &str, property: &str) -> String {
	format!("{SETTINGS_PREFIX}/{component_id}/{property}")
}

/// Returns the property name when `topic` is a settings topic of
/// `component_id`.
pub fn settings_property<'a>(
	topic: &'a str,
	component_id: &str,
) -> Option<&'a str> {
	let mut segments = topic.splitn(3, '/');
	let prefix = segments.next()?;
	let owner = segments.next()?;
	let property = segments.next()?;
	(prefix == SETTINGS_PREFIX
		&& owner == component_id
		&& !property.is_empty()
		&& !property.contains('/'))
	.then_some(property)
}
