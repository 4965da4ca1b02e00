use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Sets up tracing from the environment.
///
/// `RUST_LOG_DISABLE` turns tracing off, otherwise `RUST_LOG` selects the
/// filter. Without either the demo stays silent.
pub fn setup() {
	if std::env::var("RUST_LOG_DISABLE").is_ok() {
		return;
	}
	if std::env::var("RUST_LOG").is_err() {
		return;
	}
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| "info".into());

	tracing_subscriber::registry()
		.with(filter)
		.with(
			tracing_subscriber::fmt::layer()
				.with_target(true)
				.with_thread_ids(false)
				.compact(),
		)
		.init();
}
