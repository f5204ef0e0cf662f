use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub vendor: VendorConfig,
    pub database: DatabaseConfig,
    pub decoder: DecoderConfig,
    pub timeouts: TimeoutConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Plaintext listener the bridge uploads telemetry to.
    pub http_addr: String,
    /// Listener for the encrypted channel, relayed untouched.
    pub relay_addr: String,
    /// Port non-vendor hosts are redirected to.
    pub redirect_port: u16,
    pub max_body_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VendorConfig {
    /// Host the bridge believes it is talking to.
    pub hostname: String,
    /// `Host` header sent upstream.
    pub upstream_host: String,
    /// Address HTTP traffic is forwarded to.
    pub upstream_addr: String,
    /// Address the encrypted channel is relayed to.
    pub relay_remote: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Empty disables persistence, readings are only logged.
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DecoderConfig {
    pub workers: usize,
    pub queue_capacity: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    pub connect_seconds: u64,
    pub upstream_seconds: u64,
    pub idle_seconds: u64,
}

impl Config {
    /// Load defaults, then `config.toml` if present, then `ACULINK_*`
    /// environment variables (`ACULINK_SERVER__HTTP_ADDR=...`).
    pub fn load() -> Result<Self, config::ConfigError> {
        let _ = dotenvy::dotenv();

        let settings = Self::defaults()?
            .add_source(config::File::with_name("config").required(false))
            .add_source(
                config::Environment::with_prefix("ACULINK")
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        settings.try_deserialize()
    }

    fn defaults() -> Result<config::ConfigBuilder<config::builder::DefaultState>, config::ConfigError> {
        config::Config::builder()
            .set_default("server.http_addr", "0.0.0.0:80")?
            .set_default("server.relay_addr", "0.0.0.0:443")?
            .set_default("server.redirect_port", 8080)?
            .set_default("server.max_body_bytes", 1024 * 1024)?
            .set_default("vendor.hostname", "www.acu-link.com")?
            .set_default("vendor.upstream_host", "acu-link.com")?
            .set_default("vendor.upstream_addr", "acu-link.com:80")?
            .set_default("vendor.relay_remote", "acu-link.com:443")?
            .set_default("database.url", "")?
            .set_default("database.pool_size", 4)?
            .set_default("decoder.workers", 4)?
            .set_default("decoder.queue_capacity", 256)?
            .set_default("timeouts.connect_seconds", 10)?
            .set_default("timeouts.upstream_seconds", 30)?
            .set_default("timeouts.idle_seconds", 300)
    }
}

impl TimeoutConfig {
    pub fn connect(&self) -> Duration {
        Duration::from_secs(self.connect_seconds)
    }

    pub fn upstream(&self) -> Duration {
        Duration::from_secs(self.upstream_seconds)
    }

    pub fn idle(&self) -> Duration {
        Duration::from_secs(self.idle_seconds)
    }
}

impl DatabaseConfig {
    pub fn enabled(&self) -> bool {
        !self.url.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_deserialize() {
        let config: Config = Config::defaults()
            .unwrap()
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();

        assert_eq!(config.vendor.hostname, "www.acu-link.com");
        assert_eq!(config.vendor.upstream_host, "acu-link.com");
        assert_eq!(config.vendor.relay_remote, "acu-link.com:443");
        assert_eq!(config.server.redirect_port, 8080);
        assert_eq!(config.timeouts.idle(), Duration::from_secs(300));
        assert!(!config.database.enabled());
    }
}
