use std::env;

/// Broker URL from `MQTT_BROKER`, loaded from `demos/.env` when present.
pub fn broker_url() -> String {
	dotenv::dotenv().ok();
	if std::path::Path::new("demos/.env").exists() {
		dotenv::from_filename("demos/.env").ok();
	}
	env::var("MQTT_BROKER")
		.unwrap_or_else(|_| "mqtt://localhost:1883".to_string())
}
