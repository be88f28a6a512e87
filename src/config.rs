use graphmeter_plugin::{MetricName, MetricsRegistryBuilder, SharedRecorder, DEFAULT_PREFIX};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Value of the `service` label.
    #[serde(default = "default_service")]
    pub service: String,

    /// Value of the `version` label of the server gauges, defaults to the crate version.
    #[serde(default)]
    pub version: Option<String>,

    #[serde(default = "default_metric_prefix")]
    pub metric_prefix: String,

    #[serde(default)]
    pub skip_metrics: Vec<MetricName>,

    /// Do not time the fields of introspection types.
    #[serde(default = "default_skip_introspection")]
    pub skip_introspection: bool,

    /// Histogram buckets in seconds.
    #[serde(default)]
    pub duration_buckets: Option<Vec<f64>>,
}

impl Config {
    pub fn create_registry_builder(&self, recorder: SharedRecorder) -> MetricsRegistryBuilder {
        let mut builder = MetricsRegistryBuilder::new(recorder)
            .prefix(self.metric_prefix.clone())
            .skip_metrics(self.skip_metrics.iter().copied());
        if self.skip_introspection {
            builder = builder.skip(MetricName::QueryFieldResolutionDuration, |_, _, field| {
                field.map_or(false, |field| field.parent_type().starts_with("__"))
            });
        }
        builder
    }
}

fn default_bind() -> String {
    "127.0.0.1:8000".to_string()
}

fn default_service() -> String {
    "graphmeter".to_string()
}

fn default_metric_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_skip_introspection() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config() {
        let config = toml::from_str::<Config>("").unwrap();
        assert_eq!(config.bind, "127.0.0.1:8000");
        assert_eq!(config.service, "graphmeter");
        assert_eq!(config.metric_prefix, DEFAULT_PREFIX);
        assert!(config.skip_metrics.is_empty());
        assert!(config.skip_introspection);
        assert!(config.duration_buckets.is_none());
    }

    #[test]
    fn full_config() {
        let config = toml::from_str::<Config>(
            r#"
            bind = "0.0.0.0:4000"
            service = "accounts"
            version = "2.0.0"
            metric_prefix = "accounts_"
            skip_metrics = ["QUERY_STARTED", "QUERY_FIELD_RESOLUTION_DURATION"]
            skip_introspection = false
            duration_buckets = [0.005, 0.05, 0.5, 5.0]
            "#,
        )
        .unwrap();
        assert_eq!(config.bind, "0.0.0.0:4000");
        assert_eq!(config.service, "accounts");
        assert_eq!(config.version.as_deref(), Some("2.0.0"));
        assert_eq!(config.metric_prefix, "accounts_");
        assert_eq!(
            config.skip_metrics,
            vec![
                MetricName::QueryStarted,
                MetricName::QueryFieldResolutionDuration
            ]
        );
        assert!(!config.skip_introspection);
        assert_eq!(config.duration_buckets, Some(vec![0.005, 0.05, 0.5, 5.0]));
    }

    #[test]
    fn unknown_metric_name() {
        assert!(toml::from_str::<Config>(r#"skip_metrics = ["QUERY_UNKNOWN"]"#).is_err());
    }
}
