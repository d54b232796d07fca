//! Deployment knobs for both sides of the bridge.

use std::time::Duration;

pub const DEFAULT_WS_PORT: u16 = 8089;
pub const DEFAULT_RECONNECT_INTERVAL: Duration = Duration::from_secs(2);

/// Broker-side configuration.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Interface to bind the WebSocket listener on.
    pub host: String,
    pub port: u16,
    /// How long `send` waits for the extension's reply. `None` waits
    /// indefinitely, which is the default: the peer is long-lived and
    /// user-interactive, and an unanswered request is an accepted leak.
    pub response_timeout: Option<Duration>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            host: "127.0.0.1".into(),
            port: DEFAULT_WS_PORT,
            response_timeout: None,
        }
    }
}

impl BridgeConfig {
    /// Read configuration from the environment: `EXTENSION_PORT`,
    /// `EXTENSION_RESPONSE_TIMEOUT_MS` (0 disables the timeout) and
    /// `CONTAINERIZED` (bind all interfaces instead of loopback).
    pub fn from_env() -> Self {
        let mut config = BridgeConfig::default();
        if let Some(port) = env_parse::<u16>("EXTENSION_PORT") {
            config.port = port;
        }
        if let Some(ms) = env_parse::<u64>("EXTENSION_RESPONSE_TIMEOUT_MS") {
            config.response_timeout = (ms > 0).then_some(Duration::from_millis(ms));
        }
        if std::env::var_os("CONTAINERIZED").is_some() {
            config.host = "0.0.0.0".into();
        }
        config
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Executor-side configuration. The host runs one client per configured
/// port, so a single extension process can serve several brokers.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub ports: Vec<u16>,
    pub reconnect_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        ClientConfig {
            ports: vec![DEFAULT_WS_PORT],
            reconnect_interval: DEFAULT_RECONNECT_INTERVAL,
        }
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(%name, %raw, "Ignoring unparseable environment value");
            None
        }
    }
}
