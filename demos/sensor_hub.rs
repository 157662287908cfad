//! Publishes a few readings and prints everything under `sensors/#`.
//!
//! ```bash
//! MQTT_BROKER=mqtt://broker.hivemq.com:1883 RUST_LOG=info \
//!     cargo run --example sensor_hub
//! ```
//!
//! For a broker with a private CA use an `mqtts://` URL and point
//! `MQTT_CA_CERT` at the PEM bundle.

use std::time::Duration;

use mqtt_session::client::generate_client_id;
use mqtt_session::prelude::*;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn setup_tracing() {
	let filter = tracing_subscriber::EnvFilter::try_from_default_env()
		.unwrap_or_else(|_| "info".into());
	tracing_subscriber::registry()
		.with(filter)
		.with(tracing_subscriber::fmt::layer().with_target(true).compact())
		.init();
}

fn load_config() -> SessionConfig {
	let config = match SessionConfig::from_env() {
		| Ok(config) => config,
		| Err(err) => {
			warn!(error = %err, "No broker in environment, using localhost");
			SessionConfig::localhost(generate_client_id("sensor-hub"))
		}
	};
	config.with_reconnect(ReconnectPolicy::exponential(
		Duration::from_secs(1),
		Duration::from_secs(30),
	))
}

#[tokio::main]
async fn main() -> Result<()> {
	setup_tracing();

	let session = SessionManager::connect_with_config(
		RumqttTransport::default(),
		load_config(),
	)
	.await?;

	let mut events = session.events();
	tokio::spawn(async move {
		while let Ok(event) = events.recv().await {
			info!(?event, "Session event");
		}
	});

	let handler = Handler::from_fn(|topic, payload| {
		info!(topic, payload = %String::from_utf8_lossy(payload), "Reading received");
	});
	session
		.subscribe(["sensors/#"], handler, QoS::AtLeastOnce)
		.await?;

	let readings = [("kitchen", "21.5"), ("hall", "19.0"), ("attic", "24.1")];
	for (room, reading) in readings {
		let topic = format!("sensors/{room}/temperature");
		let id = session.publish(&topic, reading, QoS::AtLeastOnce).await?;
		info!(%topic, delivery_id = %id, "Reading acknowledged");
	}

	tokio::time::sleep(Duration::from_secs(2)).await;
	session.disconnect().await?;
	Ok(())
}
