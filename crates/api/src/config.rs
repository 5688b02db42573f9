//! Application configuration loaded from environment variables.

use std::time::Duration;

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-field lines.
    #[default]
    Pretty,
    /// One JSON object per line.
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Pretty
        }
    }
}

/// Server configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8080`)
/// - `RUST_LOG`: tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default: `pretty`)
/// - `ORDER_EVENTS_TOPIC`: lifecycle event topic (default: `"order-events"`)
/// - `ORDER_EVENTS_PARTITIONS`: partitions provisioned for the topic (default: `3`)
/// - `CONSUMER_GROUP`: consumer group of the event processor (default: `"order-processing-group"`)
/// - `PROCESSING_DELAY_MS`: simulated processing time (default: `2000`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory store when unset
/// - `KAFKA_BROKERS`: Kafka bootstrap servers; in-memory bus when unset
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub order_events_topic: String,
    pub order_events_partitions: usize,
    pub consumer_group: String,
    pub processing_delay_ms: u64,
    pub database_url: Option<String>,
    pub kafka_brokers: Option<String>,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: lookup("PORT")
                .and_then(|p| p.parse().ok())
                .unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: lookup("LOG_FORMAT")
                .map(|f| LogFormat::parse(&f))
                .unwrap_or(defaults.log_format),
            order_events_topic: lookup("ORDER_EVENTS_TOPIC").unwrap_or(defaults.order_events_topic),
            order_events_partitions: lookup("ORDER_EVENTS_PARTITIONS")
                .and_then(|p| p.parse::<usize>().ok())
                .filter(|p| *p > 0)
                .unwrap_or(defaults.order_events_partitions),
            consumer_group: lookup("CONSUMER_GROUP").unwrap_or(defaults.consumer_group),
            processing_delay_ms: lookup("PROCESSING_DELAY_MS")
                .and_then(|d| d.parse().ok())
                .unwrap_or(defaults.processing_delay_ms),
            database_url: non_empty("DATABASE_URL"),
            kafka_brokers: non_empty("KAFKA_BROKERS"),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn processing_delay(&self) -> Duration {
        Duration::from_millis(self.processing_delay_ms)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            order_events_topic: "order-events".to_string(),
            order_events_partitions: 3,
            consumer_group: "order-processing-group".to_string(),
            processing_delay_ms: 2000,
            database_url: None,
            kafka_brokers: None,
        }
    }
}
