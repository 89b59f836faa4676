//! Connection settings for the bridge.

use std::time::Duration;

use crate::error::BridgeError;
use crate::error::Result;

/// Connection settings.
///
/// The defaults match an engine listening on the loopback interface on one
/// of the ports `60001..=60005`.
#[derive(Debug, Clone, PartialEq)]
pub struct BridgeConfig {
    pub host: String,
    pub port_start: u16,
    pub port_end: u16,
    /// Upper bound for a single port attempt.
    pub connect_timeout: Duration,
    /// Upper bound for awaiting a reply. `None` waits indefinitely.
    pub call_timeout: Option<Duration>,
    pub max_frame_size: usize,
}

impl BridgeConfig {
    pub const DEFAULT_HOST: &'static str = "127.0.0.1";
    pub const DEFAULT_PORT_START: u16 = 60001;
    pub const DEFAULT_PORT_END: u16 = 60005;
    pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(1);
    pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_secs(30);
    pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024;

    pub const ENV_HOST: &'static str = "ENGINE_BRIDGE_HOST";
    pub const ENV_PORT_START: &'static str = "ENGINE_BRIDGE_PORT_START";
    pub const ENV_PORT_END: &'static str = "ENGINE_BRIDGE_PORT_END";
    pub const ENV_CONNECT_TIMEOUT_MS: &'static str = "ENGINE_BRIDGE_CONNECT_TIMEOUT_MS";
    pub const ENV_CALL_TIMEOUT_MS: &'static str = "ENGINE_BRIDGE_CALL_TIMEOUT_MS";

    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    pub fn with_ports(mut self, start: u16, end: u16) -> Self {
        self.port_start = start;
        self.port_end = end;
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_call_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.call_timeout = timeout;
        self
    }

    pub fn with_max_frame_size(mut self, size: usize) -> Self {
        self.max_frame_size = size;
        self
    }

    /// The ports scanned during discovery, in order.
    pub fn ports(&self) -> std::ops::RangeInclusive<u16> {
        self.port_start..=self.port_end
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(BridgeError::Config("bridge host must not be empty".into()));
        }
        if self.port_start == 0 || self.port_start > self.port_end {
            return Err(BridgeError::Config(format!(
                "invalid port range {}..={}",
                self.port_start, self.port_end
            )));
        }
        if self.max_frame_size == 0 {
            return Err(BridgeError::Config("max frame size must be positive".into()));
        }
        Ok(())
    }

    /// Defaults overridden by `ENGINE_BRIDGE_*` variables.
    ///
    /// A call timeout of `0` disables the timeout. Malformed values are errors.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like `from_env`, reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = Self::default();

        if let Some(host) = lookup(Self::ENV_HOST) {
            config.host = host;
        }
        if let Some(port) = parse_var::<u16>(&lookup, Self::ENV_PORT_START)? {
            config.port_start = port;
        }
        if let Some(port) = parse_var::<u16>(&lookup, Self::ENV_PORT_END)? {
            config.port_end = port;
        }
        if let Some(ms) = parse_var::<u64>(&lookup, Self::ENV_CONNECT_TIMEOUT_MS)? {
            config.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = parse_var::<u64>(&lookup, Self::ENV_CALL_TIMEOUT_MS)? {
            config.call_timeout = (ms > 0).then(|| Duration::from_millis(ms));
        }

        config.validate()?;
        Ok(config)
    }
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            host: Self::DEFAULT_HOST.to_string(),
            port_start: Self::DEFAULT_PORT_START,
            port_end: Self::DEFAULT_PORT_END,
            connect_timeout: Self::DEFAULT_CONNECT_TIMEOUT,
            call_timeout: Some(Self::DEFAULT_CALL_TIMEOUT),
            max_frame_size: Self::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<T>> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| BridgeError::Config(format!("{} has invalid value '{}'", key, raw))),
    }
}
