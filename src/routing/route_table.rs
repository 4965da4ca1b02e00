use std::collections::HashMap;

use arcstr::ArcStr;
use rumqttc::QoS;

use super::error::RouteError;
use super::route::{Route, RouteId, SharedHandler};
use crate::topic::{TopicParams, TopicPath};

/// Result of a successful [`RouteTable::first_match`] lookup.
#[derive(Debug)]
pub struct RouteMatch<'a, H> {
	/// Id of the matched route
	pub id: RouteId,
	/// The matched route
	pub route: &'a Route<H>,
	/// Parameters extracted from the topic
	pub params: TopicParams,
}

/// Ordered collection of routes.
///
/// Lookup returns the first matching route in declaration order, so an
/// earlier broad pattern shadows a later narrow one.
pub struct RouteTable<H = SharedHandler> {
	routes: Vec<(RouteId, Route<H>)>,
	next_id: usize,
}

impl<H> Default for RouteTable<H> {
	fn default() -> Self {
		Self::new()
	}
}

impl<H> RouteTable<H> {
	pub fn new() -> Self {
		Self {
			routes: Vec::new(),
			next_id: 0,
		}
	}

	/// Appends a route. Two routes may not share the same topic template.
	pub fn add(&mut self, route: Route<H>) -> Result<RouteId, RouteError> {
		let topic = route.pattern().topic_pattern();
		if self
			.routes
			.iter()
			.any(|(_, existing)| existing.pattern().topic_pattern() == topic)
		{
			return Err(RouteError::duplicate(topic.as_str()));
		}

		let id = RouteId(self.next_id);
		self.next_id = self.next_id.wrapping_add(1);
		self.routes.push((id, route));
		Ok(id)
	}

	/// Returns the first route, in declaration order, matching `topic`.
	pub fn first_match(&self, topic: &str) -> Option<RouteMatch<'_, H>> {
		let topic = TopicPath::new(topic);
		self.routes.iter().find_map(|(id, route)| {
			route.pattern().try_match(&topic).ok().map(|topic_match| {
				RouteMatch {
					id: *id,
					route,
					params: topic_match.into_params(),
				}
			})
		})
	}

	/// Removes a route.
	pub fn remove(&mut self, id: RouteId) -> Result<Route<H>, RouteError> {
		let position = self
			.routes
			.iter()
			.position(|(route_id, _)| *route_id == id)
			.ok_or(RouteError::NotFound { id })?;
		Ok(self.routes.remove(position).1)
	}

	pub fn get(&self, id: RouteId) -> Option<&Route<H>> {
		self.routes
			.iter()
			.find(|(route_id, _)| *route_id == id)
			.map(|(_, route)| route)
	}

	/// Broker subscriptions required by the routes: one entry per filter,
	/// with the highest QoS requested among the routes sharing it.
	pub fn subscription_targets(&self) -> HashMap<ArcStr, QoS> {
		let mut result: HashMap<ArcStr, QoS> = HashMap::new();

		for (_, route) in &self.routes {
			let options = route.options();
			if !options.subscribe {
				continue;
			}
			result
				.entry(route.pattern().mqtt_pattern())
				.and_modify(|existing_qos| {
					if options.qos > *existing_qos {
						*existing_qos = options.qos;
					}
				})
				.or_insert(options.qos);
		}

		result
	}

	/// True if a subscribing route still uses `filter`.
	pub fn is_filter_subscribed(&self, filter: &str) -> bool {
		self.routes.iter().any(|(_, route)| {
			route.options().subscribe
				&& route.pattern().mqtt_pattern().as_str() == filter
		})
	}

	pub fn iter(&self) -> impl Iterator<Item = (RouteId, &Route<H>)> {
		self.routes.iter().map(|(id, route)| (*id, route))
	}

	pub fn len(&self) -> usize {
		self.routes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.routes.is_empty()
	}
}
