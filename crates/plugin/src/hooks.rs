use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;

use crate::context::{FieldDescriptor, RequestContext};
use crate::labels::{labels_from_context, labels_from_field, LabelSet, LABEL_SUCCESS, LABEL_VERSION};
use crate::registry::{MetricName, MetricsRegistry};

/// Error codes caused by the client rather than the server.
pub const CLIENT_ERRORS: &[&str] = &["BAD_USER_INPUT", "INVALID_CREDENTIALS"];

struct Inner {
    registry: Arc<MetricsRegistry>,
    service: String,
    version: String,
}

/// Turns the lifecycle transitions of a GraphQL server into metrics.
#[derive(Clone)]
pub struct LifecycleHooks(Arc<Inner>);

impl LifecycleHooks {
    pub fn new(registry: Arc<MetricsRegistry>, service: impl Into<String>) -> Self {
        Self::with_version(registry, service, env!("CARGO_PKG_VERSION"))
    }

    /// Create the hooks with the version reported by the server gauges.
    pub fn with_version(
        registry: Arc<MetricsRegistry>,
        service: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self(Arc::new(Inner {
            registry,
            service: service.into(),
            version: version.into(),
        }))
    }

    pub fn registry(&self) -> &MetricsRegistry {
        &self.0.registry
    }

    pub fn service(&self) -> &str {
        &self.0.service
    }

    pub fn server_will_start(&self) {
        self.record_server(MetricName::ServerStarting);
    }

    pub fn server_will_stop(&self) {
        self.record_server(MetricName::ServerClosing);
    }

    pub fn request_did_start(&self, ctx: &dyn RequestContext) -> RequestHooks {
        let started = Instant::now();
        self.record(MetricName::QueryStarted, ctx);
        RequestHooks {
            hooks: self.clone(),
            started,
        }
    }

    fn record_server(&self, name: MetricName) {
        tracing::debug!(metric = %name, version = %self.0.version, "Server lifecycle.");
        self.registry().record(
            name,
            LabelSet::new().with(LABEL_VERSION, self.0.version.as_str()),
            Some(Utc::now().timestamp_millis() as f64),
            None,
            None,
        );
    }

    fn context_labels(&self, ctx: &dyn RequestContext) -> LabelSet {
        labels_from_context(ctx, self.service())
    }

    fn record(&self, name: MetricName, ctx: &dyn RequestContext) {
        self.registry()
            .record(name, self.context_labels(ctx), None, Some(ctx), None);
    }
}

/// Hooks of a single request, created when the request is received.
#[derive(Clone)]
pub struct RequestHooks {
    hooks: LifecycleHooks,
    started: Instant,
}

impl RequestHooks {
    pub fn parsing_did_start(&self, ctx: &dyn RequestContext) -> PhaseEnd {
        self.hooks.record(MetricName::QueryParseStarted, ctx);
        PhaseEnd {
            hooks: self.hooks.clone(),
            failed: MetricName::QueryParseFailed,
        }
    }

    pub fn validation_did_start(&self, ctx: &dyn RequestContext) -> PhaseEnd {
        self.hooks.record(MetricName::QueryValidationStarted, ctx);
        PhaseEnd {
            hooks: self.hooks.clone(),
            failed: MetricName::QueryValidationFailed,
        }
    }

    pub fn did_resolve_operation(&self, ctx: &dyn RequestContext) {
        self.hooks.record(MetricName::QueryResolved, ctx);
    }

    pub fn execution_did_start(&self, ctx: &dyn RequestContext) -> ExecutionHooks {
        self.hooks.record(MetricName::QueryExecutionStarted, ctx);
        ExecutionHooks {
            hooks: self.hooks.clone(),
        }
    }

    pub fn did_encounter_errors(&self, ctx: &dyn RequestContext) {
        let elapsed = self.elapsed_ms();
        for err in ctx.errors() {
            tracing::debug!(message = %err.message, code = ?err.code, "Request error.");
        }
        let by_client = ctx.errors().iter().any(|err| {
            err.code
                .as_deref()
                .map_or(false, |code| CLIENT_ERRORS.contains(&code))
        });

        if by_client {
            self.hooks.record(MetricName::QueryFailedByClient, ctx);
        }
        self.hooks.record(MetricName::QueryFailed, ctx);
        self.record_duration(ctx, false, elapsed);
    }

    pub fn will_send_response(&self, ctx: &dyn RequestContext) {
        let elapsed = self.elapsed_ms();
        if ctx.errors().is_empty() {
            self.record_duration(ctx, true, elapsed);
        }
    }

    fn record_duration(&self, ctx: &dyn RequestContext, success: bool, elapsed: f64) {
        let labels = self
            .hooks
            .context_labels(ctx)
            .with(LABEL_SUCCESS, success.to_string());
        self.hooks.registry().record(
            MetricName::QueryDuration,
            labels,
            Some(elapsed),
            Some(ctx),
            None,
        );
    }

    fn elapsed_ms(&self) -> f64 {
        self.started.elapsed().as_secs_f64() * 1000.0
    }
}

/// End of the parsing or validation phase.
pub struct PhaseEnd {
    hooks: LifecycleHooks,
    failed: MetricName,
}

impl PhaseEnd {
    pub fn finish(self, ctx: &dyn RequestContext, failed: bool) {
        if failed {
            self.hooks.record(self.failed, ctx);
        }
    }
}

/// Hooks of the execution phase.
#[derive(Clone)]
pub struct ExecutionHooks {
    hooks: LifecycleHooks,
}

impl ExecutionHooks {
    pub fn will_resolve_field(&self) -> FieldTimer {
        FieldTimer {
            hooks: self.hooks.clone(),
            started: Instant::now(),
        }
    }

    pub fn execution_did_end(&self, ctx: &dyn RequestContext, failed: bool) {
        if failed {
            self.hooks.record(MetricName::QueryExecutionFailed, ctx);
        }
    }
}

/// Measures the resolution of one field.
pub struct FieldTimer {
    hooks: LifecycleHooks,
    started: Instant,
}

impl FieldTimer {
    pub fn finish(self, ctx: &dyn RequestContext, field: &dyn FieldDescriptor) {
        let elapsed = self.started.elapsed().as_secs_f64() * 1000.0;
        let labels = self
            .hooks
            .context_labels(ctx)
            .merge(labels_from_field(field));
        self.hooks.registry().record(
            MetricName::QueryFieldResolutionDuration,
            labels,
            Some(elapsed),
            Some(ctx),
            Some(field),
        );
    }
}
