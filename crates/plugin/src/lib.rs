#![forbid(unsafe_code)]

pub use context::{
    FieldDescriptor, OperationContext, OperationKind, PathLink, RequestContext, RequestError,
    ResolvedField, ResponsePath,
};
pub use error::ParseMetricNameError;
pub use extension::{MetricsExtension, RequestHeaders};
pub use hooks::{
    ExecutionHooks, FieldTimer, LifecycleHooks, PhaseEnd, RequestHooks, CLIENT_ERRORS,
};
pub use registry::{
    CounterInstrument, GaugeInstrument, HistogramInstrument, Instrument, MetricDescriptor,
    MetricKind, MetricName, MetricsRegistry, MetricsRegistryBuilder, SharedRecorder,
    SkipPredicate, DEFAULT_PREFIX,
};

#[cfg(test)]
mod test_harness;

mod context;
mod dispatcher;
mod error;
mod extension;
mod hooks;
mod registry;

pub mod labels;

pub use dispatcher::convert_ms_to_s;
