use std::collections::HashMap;

use serde::Deserialize;

use crate::error::ConfigError;

/// OTLP export of the replay spans.
///
/// Every pass over a dead-letter queue is a span carrying `dlq.queue`; every
/// replay attempt nested in it carries `dlq.destination` and
/// `dlq.retry_count`. Permanent-loss and rejected-target events are logged
/// inside those spans, so a collector can tie an alert back to its queue.
///
/// ```toml
/// [telemetry]
/// enabled = true
/// endpoint = "http://otel-collector:4317"
/// sample_ratio = 0.25
///
/// [telemetry.resource_attributes]
/// "deployment.environment" = "production"
/// ```
#[derive(Debug, Deserialize)]
pub struct TelemetryConfig {
    /// Export spans. Logs are written to stdout either way.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_otel_endpoint")]
    pub endpoint: String,
    /// Reported as `service.name`; override when several replay
    /// deployments share a collector.
    #[serde(default = "default_otel_service_name")]
    pub service_name: String,
    /// Fraction of passes traced, from `0.0` to `1.0`. Passes on an idle
    /// queue are frequent and short, so production setups usually sample.
    #[serde(default = "default_otel_sample_ratio")]
    pub sample_ratio: f64,
    /// `"grpc"` or `"http"`.
    #[serde(default = "default_otel_protocol")]
    pub protocol: String,
    /// Exporter timeout in seconds.
    #[serde(default = "default_otel_timeout")]
    pub timeout_seconds: u64,
    #[serde(default)]
    pub resource_attributes: HashMap<String, String>,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: default_otel_endpoint(),
            service_name: default_otel_service_name(),
            sample_ratio: default_otel_sample_ratio(),
            protocol: default_otel_protocol(),
            timeout_seconds: default_otel_timeout(),
            resource_attributes: HashMap::new(),
        }
    }
}

impl TelemetryConfig {
    /// Only checked when export is enabled.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.enabled {
            return Ok(());
        }
        if !matches!(self.protocol.as_str(), "grpc" | "http") {
            return Err(ConfigError::Invalid(format!(
                "telemetry.protocol must be \"grpc\" or \"http\", got {:?}",
                self.protocol
            )));
        }
        if !(0.0..=1.0).contains(&self.sample_ratio) {
            return Err(ConfigError::Invalid(
                "telemetry.sample_ratio must be between 0.0 and 1.0".into(),
            ));
        }
        super::require_nonzero("telemetry.timeout_seconds", self.timeout_seconds)
    }
}

fn default_otel_endpoint() -> String {
    "http://localhost:4317".to_owned()
}

fn default_otel_service_name() -> String {
    "lazarus".to_owned()
}

fn default_otel_sample_ratio() -> f64 {
    1.0
}

fn default_otel_protocol() -> String {
    "grpc".to_owned()
}

fn default_otel_timeout() -> u64 {
    10
}
