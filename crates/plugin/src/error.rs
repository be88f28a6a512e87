use thiserror::Error;

#[derive(Debug, Error, Eq, PartialEq)]
#[error("Unknown metric name '{0}'.")]
pub struct ParseMetricNameError(pub String);
