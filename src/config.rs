use std::env;

/// Server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Bind address (127.0.0.1 for localhost, 0.0.0.0 for LAN)
    pub bind_addr: String,
    /// Port to listen on
    pub port: u16,
    /// Nominal acquisition rate of the EEG channels in Hz
    pub sample_rate_hz: f64,
    /// Analysis window length in samples; must be a power of two
    pub window_size: usize,
    /// Bounded capacity of the ingestion queue before drop-oldest engages
    pub ingest_capacity: usize,
    /// Per-subscriber outbound frame queue; a subscriber this far behind is dropped
    pub subscriber_queue_capacity: usize,
    /// Pipeline drain cadence in milliseconds
    pub drain_interval_ms: u64,
    /// Maximum samples drained from the bridge per pipeline tick
    pub drain_batch: usize,
    /// Run the built-in synthetic signal source instead of external hardware
    pub synthetic_source: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let window_size =
            parse_window_size(&env::var("WINDOW_SIZE").unwrap_or_else(|_| "256".to_string()))?;

        let sample_rate_hz: f64 = env::var("SAMPLE_RATE_HZ")
            .unwrap_or_else(|_| "250".to_string())
            .parse()
            .map_err(|_| {
                ConfigError::InvalidValue("SAMPLE_RATE_HZ must be a number".to_string())
            })?;

        if sample_rate_hz <= 0.0 {
            return Err(ConfigError::InvalidValue(
                "SAMPLE_RATE_HZ must be positive".to_string(),
            ));
        }

        Ok(Self {
            bind_addr: env::var("MINDSTREAM_BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: env::var("MINDSTREAM_PORT")
                .unwrap_or_else(|_| "8765".to_string())
                .parse()
                .map_err(|_| ConfigError::InvalidPort)?,
            sample_rate_hz,
            window_size,
            ingest_capacity: env::var("INGEST_CAPACITY")
                .unwrap_or_else(|_| "1024".to_string())
                .parse()
                .unwrap_or(1024),
            subscriber_queue_capacity: env::var("SUBSCRIBER_QUEUE_CAPACITY")
                .unwrap_or_else(|_| "64".to_string())
                .parse()
                .unwrap_or(64),
            drain_interval_ms: env::var("DRAIN_INTERVAL_MS")
                .unwrap_or_else(|_| "2".to_string())
                .parse()
                .unwrap_or(2),
            drain_batch: env::var("DRAIN_BATCH")
                .unwrap_or_else(|_| "64".to_string())
                .parse()
                .unwrap_or(64),
            synthetic_source: env::var("SYNTHETIC_SOURCE")
                .map(|v| v.to_lowercase() == "true")
                .unwrap_or(true),
        })
    }

    /// Get the full bind address (addr:port)
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.bind_addr, self.port)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1".to_string(),
            port: 8765,
            sample_rate_hz: 250.0,
            window_size: 256,
            ingest_capacity: 1024,
            subscriber_queue_capacity: 64,
            drain_interval_ms: 2,
            drain_batch: 64,
            synthetic_source: true,
        }
    }
}

// The FFT stage fixes its plan size at construction; only non-zero
// power-of-two windows are accepted.
fn parse_window_size(raw: &str) -> Result<usize, ConfigError> {
    let window_size: usize = raw
        .parse()
        .map_err(|_| ConfigError::InvalidValue("WINDOW_SIZE must be an integer".to_string()))?;
    if window_size == 0 || !window_size.is_power_of_two() {
        return Err(ConfigError::InvalidValue(
            "WINDOW_SIZE must be a power of two".to_string(),
        ));
    }
    Ok(window_size)
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid port number")]
    InvalidPort,
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_legacy_service() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:8765");
        assert_eq!(config.sample_rate_hz, 250.0);
        assert_eq!(config.window_size, 256);
    }

    #[test]
    fn window_size_must_be_power_of_two() {
        assert_eq!(parse_window_size("256").unwrap(), 256);
        assert!(parse_window_size("300").is_err());
        assert!(parse_window_size("0").is_err());
        assert!(parse_window_size("many").is_err());
    }
}
