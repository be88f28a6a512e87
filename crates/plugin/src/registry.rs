use std::collections::HashMap;
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use std::sync::Arc;

use metrics::{Key, KeyName, Level, Metadata, Recorder, SharedString, Unit};
use serde::{Deserialize, Serialize};

use crate::context::{FieldDescriptor, RequestContext};
use crate::error::ParseMetricNameError;
use crate::labels::{LabelSet, Labels};

/// Recorder that stores the metric values.
pub type SharedRecorder = Arc<dyn Recorder + Send + Sync>;

/// Decides whether a candidate recording is suppressed.
///
/// Runs on every recording, so it must be cheap and free of side effects.
pub type SkipPredicate = Arc<
    dyn Fn(&LabelSet, Option<&dyn RequestContext>, Option<&dyn FieldDescriptor>) -> bool
        + Send
        + Sync,
>;

pub const DEFAULT_PREFIX: &str = "graphql_";

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum MetricKind {
    Counter,
    Gauge,
    Histogram,
}

/// Observable lifecycle events.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MetricName {
    ServerStarting,
    ServerClosing,
    QueryStarted,
    QueryParseStarted,
    QueryParseFailed,
    QueryValidationStarted,
    QueryValidationFailed,
    QueryResolved,
    QueryExecutionStarted,
    QueryExecutionFailed,
    QueryFailed,
    QueryFailedByClient,
    QueryFieldResolutionDuration,
    QueryDuration,
}

impl MetricName {
    pub const ALL: [MetricName; 14] = [
        MetricName::ServerStarting,
        MetricName::ServerClosing,
        MetricName::QueryStarted,
        MetricName::QueryParseStarted,
        MetricName::QueryParseFailed,
        MetricName::QueryValidationStarted,
        MetricName::QueryValidationFailed,
        MetricName::QueryResolved,
        MetricName::QueryExecutionStarted,
        MetricName::QueryExecutionFailed,
        MetricName::QueryFailed,
        MetricName::QueryFailedByClient,
        MetricName::QueryFieldResolutionDuration,
        MetricName::QueryDuration,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            MetricName::ServerStarting => "SERVER_STARTING",
            MetricName::ServerClosing => "SERVER_CLOSING",
            MetricName::QueryStarted => "QUERY_STARTED",
            MetricName::QueryParseStarted => "QUERY_PARSE_STARTED",
            MetricName::QueryParseFailed => "QUERY_PARSE_FAILED",
            MetricName::QueryValidationStarted => "QUERY_VALIDATION_STARTED",
            MetricName::QueryValidationFailed => "QUERY_VALIDATION_FAILED",
            MetricName::QueryResolved => "QUERY_RESOLVED",
            MetricName::QueryExecutionStarted => "QUERY_EXECUTION_STARTED",
            MetricName::QueryExecutionFailed => "QUERY_EXECUTION_FAILED",
            MetricName::QueryFailed => "QUERY_FAILED",
            MetricName::QueryFailedByClient => "QUERY_FAILED_BY_CLIENT",
            MetricName::QueryFieldResolutionDuration => "QUERY_FIELD_RESOLUTION_DURATION",
            MetricName::QueryDuration => "QUERY_DURATION",
        }
    }

    pub fn kind(&self) -> MetricKind {
        match self {
            MetricName::ServerStarting | MetricName::ServerClosing => MetricKind::Gauge,
            MetricName::QueryFieldResolutionDuration | MetricName::QueryDuration => {
                MetricKind::Histogram
            }
            _ => MetricKind::Counter,
        }
    }

    /// Exported name, without prefix.
    pub fn metric_name(&self) -> &'static str {
        match self {
            MetricName::ServerStarting => "server_starting",
            MetricName::ServerClosing => "server_closing",
            MetricName::QueryStarted => "query_started_total",
            MetricName::QueryParseStarted => "query_parse_started_total",
            MetricName::QueryParseFailed => "query_parse_failed_total",
            MetricName::QueryValidationStarted => "query_validation_started_total",
            MetricName::QueryValidationFailed => "query_validation_failed_total",
            MetricName::QueryResolved => "query_resolved_total",
            MetricName::QueryExecutionStarted => "query_execution_started_total",
            MetricName::QueryExecutionFailed => "query_execution_failed_total",
            MetricName::QueryFailed => "query_failed_total",
            MetricName::QueryFailedByClient => "query_failed_by_client_total",
            MetricName::QueryFieldResolutionDuration => {
                "query_field_resolution_duration_seconds"
            }
            MetricName::QueryDuration => "query_duration_seconds",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            MetricName::ServerStarting => "The server started at this unix time in seconds.",
            MetricName::ServerClosing => "The server closed at this unix time in seconds.",
            MetricName::QueryStarted => "Total number of GraphQL requests received.",
            MetricName::QueryParseStarted => "Total number of queries that started parsing.",
            MetricName::QueryParseFailed => "Total number of queries that failed to parse.",
            MetricName::QueryValidationStarted => {
                "Total number of queries that started validation."
            }
            MetricName::QueryValidationFailed => {
                "Total number of queries that failed validation."
            }
            MetricName::QueryResolved => "Total number of resolved operations.",
            MetricName::QueryExecutionStarted => {
                "Total number of queries that started execution."
            }
            MetricName::QueryExecutionFailed => "Total number of queries that failed execution.",
            MetricName::QueryFailed => "Total number of queries that encountered errors.",
            MetricName::QueryFailedByClient => {
                "Total number of queries that failed because of client input."
            }
            MetricName::QueryFieldResolutionDuration => {
                "The GraphQL field resolution latencies in seconds."
            }
            MetricName::QueryDuration => "The GraphQL query latencies in seconds.",
        }
    }

    pub fn unit(&self) -> Unit {
        match self.kind() {
            MetricKind::Counter => Unit::Count,
            MetricKind::Gauge | MetricKind::Histogram => Unit::Seconds,
        }
    }
}

impl Display for MetricName {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MetricName {
    type Err = ParseMetricNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetricName::ALL
            .into_iter()
            .find(|name| name.as_str() == s)
            .ok_or_else(|| ParseMetricNameError(s.to_string()))
    }
}

#[derive(Clone)]
struct Handle {
    key: KeyName,
    recorder: SharedRecorder,
}

impl Handle {
    fn key(&self, labels: &Labels) -> Key {
        Key::from_parts(self.key.clone(), labels.to_metric_labels())
    }
}

fn metadata() -> Metadata<'static> {
    Metadata::new(module_path!(), Level::INFO, Some(module_path!()))
}

#[derive(Clone)]
pub struct CounterInstrument(Handle);

impl CounterInstrument {
    pub fn increment(&self, labels: &Labels) {
        self.0
            .recorder
            .register_counter(&self.0.key(labels), &metadata())
            .increment(1);
    }
}

#[derive(Clone)]
pub struct GaugeInstrument(Handle);

impl GaugeInstrument {
    pub fn set(&self, labels: &Labels, value: f64) {
        self.0
            .recorder
            .register_gauge(&self.0.key(labels), &metadata())
            .set(value);
    }
}

#[derive(Clone)]
pub struct HistogramInstrument(Handle);

impl HistogramInstrument {
    pub fn observe(&self, labels: &Labels, value: f64) {
        self.0
            .recorder
            .register_histogram(&self.0.key(labels), &metadata())
            .record(value);
    }
}

/// A metric instance, one variant per kind.
#[derive(Clone)]
pub enum Instrument {
    Counter(CounterInstrument),
    Gauge(GaugeInstrument),
    Histogram(HistogramInstrument),
}

impl Instrument {
    pub fn kind(&self) -> MetricKind {
        match self {
            Instrument::Counter(_) => MetricKind::Counter,
            Instrument::Gauge(_) => MetricKind::Gauge,
            Instrument::Histogram(_) => MetricKind::Histogram,
        }
    }
}

pub struct MetricDescriptor {
    pub instrument: Instrument,
    pub skip: SkipPredicate,
}

/// The descriptors of all lifecycle metrics.
pub struct MetricsRegistry {
    descriptors: [MetricDescriptor; 14],
}

impl MetricsRegistry {
    pub fn builder(recorder: SharedRecorder) -> MetricsRegistryBuilder {
        MetricsRegistryBuilder::new(recorder)
    }

    pub fn descriptor(&self, name: MetricName) -> &MetricDescriptor {
        &self.descriptors[name as usize]
    }
}

pub struct MetricsRegistryBuilder {
    recorder: SharedRecorder,
    prefix: String,
    skips: HashMap<MetricName, SkipPredicate>,
}

impl MetricsRegistryBuilder {
    pub fn new(recorder: SharedRecorder) -> Self {
        Self {
            recorder,
            prefix: DEFAULT_PREFIX.to_string(),
            skips: Default::default(),
        }
    }

    pub fn prefix(self, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            ..self
        }
    }

    /// Add a skip predicate for `name`.
    ///
    /// Predicates added for the same metric are combined, any of them can veto a recording.
    pub fn skip<F>(mut self, name: MetricName, predicate: F) -> Self
    where
        F: Fn(&LabelSet, Option<&dyn RequestContext>, Option<&dyn FieldDescriptor>) -> bool
            + Send
            + Sync
            + 'static,
    {
        let predicate: SkipPredicate = match self.skips.remove(&name) {
            Some(prev) => Arc::new(
                move |labels: &LabelSet,
                      ctx: Option<&dyn RequestContext>,
                      field: Option<&dyn FieldDescriptor>| {
                    prev(labels, ctx, field) || predicate(labels, ctx, field)
                },
            ),
            None => Arc::new(predicate),
        };
        self.skips.insert(name, predicate);
        self
    }

    /// Never record the given metrics.
    pub fn skip_metrics(self, names: impl IntoIterator<Item = MetricName>) -> Self {
        names
            .into_iter()
            .fold(self, |builder, name| builder.skip(name, |_, _, _| true))
    }

    pub fn build(mut self) -> MetricsRegistry {
        let never: SkipPredicate = Arc::new(
            |_: &LabelSet, _: Option<&dyn RequestContext>, _: Option<&dyn FieldDescriptor>| false,
        );
        let descriptors = MetricName::ALL.map(|name| {
            let key = KeyName::from(format!("{}{}", self.prefix, name.metric_name()));
            let description: SharedString = name.description().into();
            let handle = Handle {
                key: key.clone(),
                recorder: self.recorder.clone(),
            };
            let instrument = match name.kind() {
                MetricKind::Counter => {
                    self.recorder
                        .describe_counter(key, Some(name.unit()), description);
                    Instrument::Counter(CounterInstrument(handle))
                }
                MetricKind::Gauge => {
                    self.recorder
                        .describe_gauge(key, Some(name.unit()), description);
                    Instrument::Gauge(GaugeInstrument(handle))
                }
                MetricKind::Histogram => {
                    self.recorder
                        .describe_histogram(key, Some(name.unit()), description);
                    Instrument::Histogram(HistogramInstrument(handle))
                }
            };
            MetricDescriptor {
                instrument,
                skip: self.skips.remove(&name).unwrap_or_else(|| never.clone()),
            }
        });
        MetricsRegistry { descriptors }
    }
}
