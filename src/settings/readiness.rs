//! Settings-gated readiness.
//!
//! A component declares the settings it needs before it can operate. On
//! connect the gate either becomes ready at once (nothing declared) or waits
//! for every declared property to arrive on its settings topic, bounded by
//! an optional timeout.

use std::collections::HashMap;
use std::time::Duration;

use tokio::time::Instant;
use tracing::debug;

use crate::payload::Payload;

/// Readiness lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessState {
	/// Not connected yet
	Idle,
	/// Waiting for declared settings
	AwaitingSettings,
	/// All declared settings received. Terminal.
	Ready,
	/// Timeout elapsed before all settings arrived. Terminal.
	TimedOut,
}

/// Transition the caller must signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadinessTransition {
	Ready,
	TimedOut,
}

/// State machine deciding when a component is ready.
#[derive(Debug)]
pub struct ReadinessGate {
	declared: Vec<String>,
	received: HashMap<String, Payload>,
	state: ReadinessState,
	timeout: Option<Duration>,
	deadline: Option<Instant>,
}

impl ReadinessGate {
	/// Creates a gate for `declared` properties. Duplicates are ignored;
	/// `timeout` of `None` waits forever.
	pub fn new<I, S>(declared: I, timeout: Option<Duration>) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		let mut unique: Vec<String> = Vec::new();
		for property in declared {
			let property = property.into();
			if !unique.contains(&property) {
				unique.push(property);
			}
		}
		Self {
			declared: unique,
			received: HashMap::new(),
			state: ReadinessState::Idle,
			timeout,
			deadline: None,
		}
	}

	pub fn declared(&self) -> &[String] {
		&self.declared
	}

	pub fn state(&self) -> ReadinessState {
		self.state
	}

	pub fn is_ready(&self) -> bool {
		self.state == ReadinessState::Ready
	}

	/// Pending timeout, if armed.
	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Declared properties received so far.
	pub fn received(&self) -> &HashMap<String, Payload> {
		&self.received
	}

	fn all_received(&self) -> bool {
		self.declared.iter().all(|p| self.received.contains_key(p))
	}

	fn become_ready(&mut self) -> Option<ReadinessTransition> {
		self.state = ReadinessState::Ready;
		self.deadline = None;
		Some(ReadinessTransition::Ready)
	}

	/// Starts waiting for settings. Only acts in `Idle`.
	pub fn begin(&mut self, now: Instant) -> Option<ReadinessTransition> {
		if self.state != ReadinessState::Idle {
			return None;
		}
		if self.all_received() {
			return self.become_ready();
		}
		self.state = ReadinessState::AwaitingSettings;
		self.deadline = self.timeout.map(|timeout| now + timeout);
		debug!(
			declared = ?self.declared,
			timeout = ?self.timeout,
			"Awaiting component settings"
		);
		None
	}

	/// Records a setting received from the broker.
	pub fn on_setting(
		&mut self,
		property: &str,
		value: Payload,
	) -> Option<ReadinessTransition> {
		if !self.declared.iter().any(|p| p == property) {
			return None;
		}
		self.received.insert(property.to_string(), value);
		if self.state == ReadinessState::AwaitingSettings && self.all_received()
		{
			return self.become_ready();
		}
		None
	}

	/// Fires the timeout if it is still pending and has elapsed.
	pub fn on_timeout(&mut self, now: Instant) -> Option<ReadinessTransition> {
		match (self.state, self.deadline) {
			| (ReadinessState::AwaitingSettings, Some(deadline))
				if now >= deadline =>
			{
				self.state = ReadinessState::TimedOut;
				self.deadline = None;
				Some(ReadinessTransition::TimedOut)
			}
			| _ => None,
		}
	}
}
