//! Configuration for session creation
#![allow(missing_docs)]

use std::path::PathBuf;
use std::time::Duration;

use rumqttc::{MqttOptions, QoS};
use uuid::Uuid;

use super::error::ConfigError;
use crate::transport::{ConnectOptions, Credentials};

/// Default MQTT port for plain TCP
pub const DEFAULT_PORT: u16 = 1883;
/// Default MQTT port for TLS
pub const DEFAULT_TLS_PORT: u16 = 8883;

/// Automatic reconnection after an unexpected connection loss
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconnectPolicy {
	pub enabled: bool,
	/// Delay before the first attempt, doubled after every failure
	pub initial_delay: Duration,
	/// Upper bound for the delay between attempts
	pub max_delay: Duration,
	/// Give up after this many failed attempts, `None` retries forever
	pub max_attempts: Option<u32>,
}

impl Default for ReconnectPolicy {
	fn default() -> Self {
		Self {
			enabled: false,
			initial_delay: Duration::from_secs(1),
			max_delay: Duration::from_secs(60),
			max_attempts: None,
		}
	}
}

impl ReconnectPolicy {
	pub fn disabled() -> Self {
		Self::default()
	}

	/// Enabled policy with exponential backoff between the given bounds
	pub fn exponential(initial_delay: Duration, max_delay: Duration) -> Self {
		Self {
			enabled: true,
			initial_delay,
			max_delay,
			max_attempts: None,
		}
	}

	pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
		self.max_attempts = Some(max_attempts);
		self
	}

	fn validate(&self) -> Result<(), ConfigError> {
		if !self.enabled {
			return Ok(());
		}
		if self.initial_delay.is_zero() {
			return Err(ConfigError::InvalidBackoff {
				reason: "initial delay must be greater than zero".to_string(),
			});
		}
		if self.max_delay < self.initial_delay {
			return Err(ConfigError::InvalidBackoff {
				reason: format!(
					"max delay {:?} is shorter than initial delay {:?}",
					self.max_delay, self.initial_delay
				),
			});
		}
		if self.max_attempts == Some(0) {
			return Err(ConfigError::InvalidBackoff {
				reason: "max attempts must be greater than zero".to_string(),
			});
		}
		Ok(())
	}
}

/// Session-level behavior settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
	/// Capacity of the [`SessionEvent`](crate::SessionEvent) broadcast
	/// channel (must be > 0)
	pub notification_capacity: usize,
	/// How often pending deliveries are checked for expiry
	pub sweep_interval: Duration,
}

impl Default for SessionSettings {
	fn default() -> Self {
		Self {
			notification_capacity: 64,
			sweep_interval: Duration::from_secs(1),
		}
	}
}

/// Identity, connection options and timeouts of a session
#[derive(Debug, Clone)]
pub struct SessionConfig {
	pub client_id: String,
	pub host: String,
	pub port: u16,
	pub credentials: Option<Credentials>,
	/// Ask the broker to discard any previous session state
	pub clean_session: bool,
	pub keep_alive: Duration,
	pub connect_timeout: Duration,
	/// Falls back to `connect_timeout` when unset
	pub ack_timeout: Option<Duration>,
	/// Bound for the graceful part of a disconnect
	pub disconnect_timeout: Duration,
	/// QoS used by messages that do not set their own
	pub default_qos: QoS,
	pub tls: bool,
	/// Custom CA bundle (PEM) for brokers with private certificates
	pub ca_cert: Option<PathBuf>,
	pub reconnect: ReconnectPolicy,
	pub settings: SessionSettings,
}

impl SessionConfig {
	/// Create config with default settings
	pub fn new(
		client_id: impl Into<String>,
		host: impl Into<String>,
		port: u16,
	) -> Self {
		Self {
			client_id: client_id.into(),
			host: host.into(),
			port,
			credentials: None,
			clean_session: true,
			keep_alive: Duration::from_secs(60),
			connect_timeout: Duration::from_secs(10),
			ack_timeout: None,
			disconnect_timeout: Duration::from_millis(250),
			default_qos: QoS::AtLeastOnce,
			tls: false,
			ca_cert: None,
			reconnect: ReconnectPolicy::default(),
			settings: SessionSettings::default(),
		}
	}

	/// Create config for localhost:1883
	pub fn localhost(client_id: impl Into<String>) -> Self {
		Self::new(client_id, "localhost", DEFAULT_PORT)
	}

	/// Parse configuration from an MQTT URL.
	///
	/// Uses the `rumqttc` URL format, e.g.
	/// `mqtt://broker:1883?client_id=sensor-1&keep_alive_secs=30`.
	/// `mqtts://` and `ssl://` enable TLS.
	pub fn from_url(url: &str) -> Result<Self, ConfigError> {
		let options = MqttOptions::parse_url(url)?;
		let (host, port) = options.broker_address();
		let mut config = Self::new(options.client_id(), host, port);
		config.keep_alive = options.keep_alive();
		config.clean_session = options.clean_session();
		config.credentials = options
			.credentials()
			.map(|(username, password)| Credentials { username, password });
		let scheme = url.split("://").next().unwrap_or_default();
		config.tls = matches!(scheme.to_ascii_lowercase().as_str(), "mqtts" | "ssl");
		Ok(config)
	}

	/// Build configuration from the process environment.
	///
	/// Loads `.env` first if present. Reads `MQTT_BROKER` (`host`,
	/// `host:port` or `scheme://host:port`, default `localhost`),
	/// `MQTT_CLIENT_ID` (generated when missing), `MQTT_USERNAME`,
	/// `MQTT_PASSWORD`, `MQTT_QOS` and `MQTT_CA_CERT` (enables TLS).
	pub fn from_env() -> Result<Self, ConfigError> {
		let _ = dotenv::dotenv();
		Self::from_lookup(|name| std::env::var(name).ok())
	}

	/// Same as [`from_env`](Self::from_env) with a custom variable source.
	pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
	where F: Fn(&str) -> Option<String>
	{
		let broker =
			lookup("MQTT_BROKER").unwrap_or_else(|| "localhost".to_string());
		let (host, port, tls) = parse_broker(&broker)?;
		let client_id = lookup("MQTT_CLIENT_ID")
			.filter(|id| !id.is_empty())
			.unwrap_or_else(|| generate_client_id("mqtt-session"));

		let mut config = Self::new(client_id, host, port);
		config.tls = tls;
		if let Some(username) = lookup("MQTT_USERNAME") {
			let password = lookup("MQTT_PASSWORD").unwrap_or_default();
			config.credentials = Some(Credentials { username, password });
		}
		if let Some(raw) = lookup("MQTT_QOS") {
			let level = raw.trim().parse::<u8>().map_err(|_| {
				ConfigError::InvalidEnv {
					name: "MQTT_QOS",
					value: raw.clone(),
				}
			})?;
			config.default_qos = qos(level)?;
		}
		if let Some(path) = lookup("MQTT_CA_CERT").filter(|p| !p.is_empty()) {
			config = config.with_ca_cert(path);
		}
		Ok(config)
	}

	pub fn with_credentials(
		mut self,
		username: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		self.credentials = Some(Credentials {
			username: username.into(),
			password: password.into(),
		});
		self
	}

	pub fn with_clean_session(mut self, clean_session: bool) -> Self {
		self.clean_session = clean_session;
		self
	}

	pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
		self.keep_alive = keep_alive;
		self
	}

	pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
		self.connect_timeout = timeout;
		self
	}

	pub fn with_ack_timeout(mut self, timeout: Duration) -> Self {
		self.ack_timeout = Some(timeout);
		self
	}

	pub fn with_disconnect_timeout(mut self, timeout: Duration) -> Self {
		self.disconnect_timeout = timeout;
		self
	}

	pub fn with_default_qos(mut self, qos: QoS) -> Self {
		self.default_qos = qos;
		self
	}

	pub fn with_tls(mut self, tls: bool) -> Self {
		self.tls = tls;
		self
	}

	/// Trusts the CA certificates in the PEM file at `path` and enables TLS.
	pub fn with_ca_cert(mut self, path: impl Into<PathBuf>) -> Self {
		self.ca_cert = Some(path.into());
		self.tls = true;
		self
	}

	pub fn with_reconnect(mut self, reconnect: ReconnectPolicy) -> Self {
		self.reconnect = reconnect;
		self
	}

	pub fn with_settings(mut self, settings: SessionSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Effective acknowledgement timeout
	pub fn ack_timeout(&self) -> Duration {
		self.ack_timeout.unwrap_or(self.connect_timeout)
	}

	/// Checks every field without touching the network.
	pub fn validate(&self) -> Result<(), ConfigError> {
		if self.host.trim().is_empty() {
			return Err(ConfigError::MissingHost);
		}
		if self.client_id.is_empty() {
			return Err(ConfigError::MissingClientId);
		}
		if self.port == 0 {
			return Err(ConfigError::InvalidPort);
		}
		let timeouts = [
			("connect_timeout", self.connect_timeout),
			("ack_timeout", self.ack_timeout()),
			("disconnect_timeout", self.disconnect_timeout),
			("sweep_interval", self.settings.sweep_interval),
		];
		if let Some(&(name, _)) =
			timeouts.iter().find(|(_, timeout)| timeout.is_zero())
		{
			return Err(ConfigError::ZeroTimeout { name });
		}
		// rumqttc only accepts 0 (disabled) or whole seconds >= 1
		if !self.keep_alive.is_zero() && self.keep_alive < Duration::from_secs(1)
		{
			return Err(ConfigError::InvalidKeepAlive {
				millis: self.keep_alive.as_millis() as u64,
			});
		}
		if self.settings.notification_capacity == 0 {
			return Err(ConfigError::ZeroCapacity {
				name: "notification_capacity",
			});
		}
		if self.ca_cert.is_some() && !self.tls {
			return Err(ConfigError::CaCertWithoutTls);
		}
		self.reconnect.validate()
	}

	/// Options handed to the transport on every connect
	pub fn connect_options(&self) -> ConnectOptions {
		ConnectOptions {
			client_id: self.client_id.clone(),
			host: self.host.clone(),
			port: self.port,
			credentials: self.credentials.clone(),
			clean_session: self.clean_session,
			keep_alive: self.keep_alive,
			tls: self.tls,
			ca_cert: self.ca_cert.clone(),
		}
	}
}

/// Converts a numeric QoS level.
pub fn qos(level: u8) -> Result<QoS, ConfigError> {
	match level {
		| 0 => Ok(QoS::AtMostOnce),
		| 1 => Ok(QoS::AtLeastOnce),
		| 2 => Ok(QoS::ExactlyOnce),
		| level => Err(ConfigError::InvalidQos { level }),
	}
}

/// Builds a client id from `prefix` and a random suffix.
pub fn generate_client_id(prefix: &str) -> String {
	let suffix = Uuid::new_v4().simple().to_string();
	format!("{prefix}-{}", &suffix[..12])
}

fn parse_broker(broker: &str) -> Result<(String, u16, bool), ConfigError> {
	let invalid = || ConfigError::InvalidEnv {
		name: "MQTT_BROKER",
		value: broker.to_string(),
	};
	let (tls, address) = match broker.split_once("://") {
		| Some((scheme, address)) => {
			match scheme.to_ascii_lowercase().as_str() {
				| "mqtts" | "ssl" => (true, address),
				| "mqtt" | "tcp" => (false, address),
				| _ => return Err(invalid()),
			}
		}
		| None => (false, broker),
	};
	let address = address.trim_end_matches('/');
	let default_port = if tls { DEFAULT_TLS_PORT } else { DEFAULT_PORT };
	let (host, port) = match address.rsplit_once(':') {
		| Some((host, port)) => {
			(host, port.parse::<u16>().map_err(|_| invalid())?)
		}
		| None => (address, default_port),
	};
	if host.is_empty() {
		return Err(invalid());
	}
	Ok((host.to_string(), port, tls))
}
