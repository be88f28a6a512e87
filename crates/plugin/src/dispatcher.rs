use crate::context::{FieldDescriptor, RequestContext};
use crate::labels::{filter_labels, LabelSet};
use crate::registry::{Instrument, MetricName, MetricsRegistry};

/// Convert milliseconds to seconds.
#[inline]
pub fn convert_ms_to_s(ms: f64) -> f64 {
    ms / 1000.0
}

impl MetricsRegistry {
    /// Record a lifecycle event.
    ///
    /// Gauges and histograms require `value`, in milliseconds. It is stored in seconds.
    pub fn record(
        &self,
        name: MetricName,
        labels: LabelSet,
        value: Option<f64>,
        ctx: Option<&dyn RequestContext>,
        field: Option<&dyn FieldDescriptor>,
    ) {
        let descriptor = self.descriptor(name);
        if (descriptor.skip)(&labels, ctx, field) {
            tracing::debug!(metric = %name, "Metric skipped.");
            return;
        }

        let labels = filter_labels(labels);
        match &descriptor.instrument {
            Instrument::Counter(counter) => counter.increment(&labels),
            Instrument::Gauge(gauge) => match value {
                Some(value) => gauge.set(&labels, convert_ms_to_s(value)),
                None => missing_value(name),
            },
            Instrument::Histogram(histogram) => match value {
                Some(value) => histogram.observe(&labels, convert_ms_to_s(value)),
                None => missing_value(name),
            },
        }
    }
}

fn missing_value(name: MetricName) {
    debug_assert!(false, "metric {} requires a value", name);
    tracing::error!(metric = %name, "A value is required to record this metric.");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OperationContext;
    use crate::labels::{LABEL_APP, LABEL_SERVICE};
    use crate::test_harness::{label, registry_builder, Recorded};

    #[test]
    fn counter_ignores_value() {
        let (builder, snapshotter) = registry_builder();
        let registry = builder.build();

        registry.record(
            MetricName::QueryStarted,
            LabelSet::new().with(LABEL_SERVICE, "accounts"),
            Some(12.0),
            None,
            None,
        );
        registry.record(
            MetricName::QueryStarted,
            LabelSet::new().with(LABEL_SERVICE, "accounts"),
            None,
            None,
            None,
        );

        let recorded = Recorded::take(&snapshotter);
        assert_eq!(recorded.counter(MetricName::QueryStarted), 2);
    }

    #[test]
    fn gauge_and_histogram_in_seconds() {
        let (builder, snapshotter) = registry_builder();
        let registry = builder.build();

        registry.record(
            MetricName::ServerStarting,
            LabelSet::new(),
            Some(1_700_000_000_000.0),
            None,
            None,
        );
        registry.record(
            MetricName::QueryDuration,
            LabelSet::new(),
            Some(250.0),
            None,
            None,
        );
        registry.record(
            MetricName::QueryDuration,
            LabelSet::new(),
            Some(1500.0),
            None,
            None,
        );

        let recorded = Recorded::take(&snapshotter);
        assert_eq!(
            recorded.gauge(MetricName::ServerStarting),
            Some(1_700_000_000.0)
        );
        assert_eq!(recorded.histogram(MetricName::QueryDuration), vec![0.25, 1.5]);
    }

    #[test]
    fn absent_labels_are_not_recorded() {
        let (builder, snapshotter) = registry_builder();
        let registry = builder.build();

        let mut labels = LabelSet::new().with(LABEL_SERVICE, "accounts");
        labels.insert(LABEL_APP, None);
        registry.record(MetricName::QueryFailed, labels, None, None, None);

        let recorded = Recorded::take(&snapshotter);
        assert_eq!(
            recorded.labels(MetricName::QueryFailed),
            vec![vec![label(LABEL_SERVICE, "accounts")]]
        );
    }

    #[test]
    fn skipped_metric_has_no_effect() {
        let (builder, snapshotter) = registry_builder();
        let registry = builder
            .skip(MetricName::QueryStarted, |_, _, _| true)
            .build();

        let ctx = OperationContext::default().with_operation_name("GetUser");
        registry.record(
            MetricName::QueryStarted,
            LabelSet::new().with(LABEL_SERVICE, "accounts"),
            None,
            Some(&ctx),
            None,
        );
        registry.record(MetricName::QueryStarted, LabelSet::new(), None, None, None);
        registry.record(MetricName::QueryFailed, LabelSet::new(), None, None, None);

        let recorded = Recorded::take(&snapshotter);
        assert!(recorded.series(MetricName::QueryStarted).is_empty());
        assert_eq!(recorded.counter(MetricName::QueryFailed), 1);
    }

    #[test]
    fn skip_predicate_sees_context() {
        let (builder, snapshotter) = registry_builder();
        let registry = builder
            .skip(MetricName::QueryResolved, |_, ctx, _| {
                ctx.and_then(|ctx| ctx.operation_name()) == Some("IntrospectionQuery")
            })
            .build();

        let introspection = OperationContext::default().with_operation_name("IntrospectionQuery");
        let other = OperationContext::default().with_operation_name("GetUser");
        registry.record(
            MetricName::QueryResolved,
            LabelSet::new(),
            None,
            Some(&introspection),
            None,
        );
        registry.record(
            MetricName::QueryResolved,
            LabelSet::new(),
            None,
            Some(&other),
            None,
        );

        let recorded = Recorded::take(&snapshotter);
        assert_eq!(recorded.counter(MetricName::QueryResolved), 1);
    }

    #[test]
    fn ms_to_s() {
        assert_eq!(convert_ms_to_s(0.0), 0.0);
        assert_eq!(convert_ms_to_s(1234.0), 1.234);
    }
}
