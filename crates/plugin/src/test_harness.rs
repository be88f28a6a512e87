use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use metrics_util::CompositeKey;

use crate::registry::{MetricName, MetricsRegistry, MetricsRegistryBuilder, DEFAULT_PREFIX};

pub fn registry_builder() -> (MetricsRegistryBuilder, Snapshotter) {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    (MetricsRegistry::builder(Arc::new(recorder)), snapshotter)
}

/// Taking a snapshot drains the recorded histogram values.
pub struct Recorded(Vec<(CompositeKey, DebugValue)>);

impl Recorded {
    pub fn take(snapshotter: &Snapshotter) -> Self {
        Recorded(
            snapshotter
                .snapshot()
                .into_vec()
                .into_iter()
                .map(|(key, _, _, value)| (key, value))
                .collect(),
        )
    }

    /// Every series of a metric as `(labels, value)`.
    pub fn series(&self, name: MetricName) -> Vec<(Vec<(String, String)>, &DebugValue)> {
        let metric = format!("{}{}", DEFAULT_PREFIX, name.metric_name());
        self.0
            .iter()
            .filter(|(key, _)| key.key().name() == metric)
            .map(|(key, value)| {
                let mut labels: Vec<_> = key
                    .key()
                    .labels()
                    .map(|label| (label.key().to_string(), label.value().to_string()))
                    .collect();
                labels.sort();
                (labels, value)
            })
            .collect()
    }

    pub fn counter(&self, name: MetricName) -> u64 {
        self.series(name)
            .into_iter()
            .map(|(_, value)| match value {
                DebugValue::Counter(value) => *value,
                _ => 0,
            })
            .sum()
    }

    pub fn gauge(&self, name: MetricName) -> Option<f64> {
        self.series(name)
            .into_iter()
            .find_map(|(_, value)| match value {
                DebugValue::Gauge(value) => Some(value.0),
                _ => None,
            })
    }

    /// Observed values, sorted.
    pub fn histogram(&self, name: MetricName) -> Vec<f64> {
        let mut values: Vec<f64> = self
            .series(name)
            .into_iter()
            .flat_map(|(_, value)| match value {
                DebugValue::Histogram(values) => values.iter().map(|value| value.0).collect(),
                _ => Vec::new(),
            })
            .collect();
        values.sort_by(f64::total_cmp);
        values
    }

    pub fn labels(&self, name: MetricName) -> Vec<Vec<(String, String)>> {
        self.series(name)
            .into_iter()
            .map(|(labels, _)| labels)
            .collect()
    }
}

pub fn label(key: &str, value: &str) -> (String, String) {
    (key.to_string(), value.to_string())
}
