//! Component runtime
//!
//! [`Component`] is the public handle. Route declarations and lifecycle
//! commands go to a dispatcher task that owns the route table and the
//! readiness gate; publishes and direct subscriptions go straight to the
//! connection adapter.

mod component;
mod config;
mod context;
mod dispatcher;
mod error;
mod signal;

pub use component::{Component, ComponentBuilder};
pub use config::{ComponentConfig, ComponentSettings, DEFAULT_SETTINGS_TIMEOUT};
pub use context::{HandlerContext, PublishOptions, SubscribeOptions};
pub use error::ComponentError;
pub use signal::ComponentSignal;
