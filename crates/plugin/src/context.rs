use std::fmt::{self, Display, Formatter};

use http::HeaderMap;

/// Kind of a GraphQL operation.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OperationKind {
    Query,
    Mutation,
    Subscription,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Query => "query",
            OperationKind::Mutation => "mutation",
            OperationKind::Subscription => "subscription",
        }
    }
}

impl Display for OperationKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error accumulated while serving a request.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct RequestError {
    pub message: String,

    /// The `extensions.code` of the error, if it is a string.
    pub code: Option<String>,
}

impl RequestError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            code: None,
        }
    }

    pub fn code(self, code: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..self
        }
    }
}

/// Read-only view of a request, as supplied by the host pipeline.
pub trait RequestContext {
    /// Operation name sent by the client.
    fn operation_name(&self) -> Option<&str>;

    /// Kind of the selected operation, once the document has been parsed.
    fn operation(&self) -> Option<OperationKind>;

    /// Value of an HTTP request header.
    fn header(&self, name: &str) -> Option<&str>;

    /// Errors accumulated so far.
    fn errors(&self) -> &[RequestError];
}

/// Owned request context.
#[derive(Debug, Default, Clone)]
pub struct OperationContext {
    pub operation_name: Option<String>,
    pub operation: Option<OperationKind>,
    pub headers: HeaderMap,
    pub errors: Vec<RequestError>,
}

impl OperationContext {
    pub fn with_operation_name(self, operation_name: impl Into<String>) -> Self {
        Self {
            operation_name: Some(operation_name.into()),
            ..self
        }
    }

    pub fn with_operation(self, operation: OperationKind) -> Self {
        Self {
            operation: Some(operation),
            ..self
        }
    }

    pub fn with_headers(self, headers: HeaderMap) -> Self {
        Self { headers, ..self }
    }

    pub fn with_error(mut self, error: RequestError) -> Self {
        self.errors.push(error);
        self
    }
}

impl RequestContext for OperationContext {
    fn operation_name(&self) -> Option<&str> {
        self.operation_name.as_deref()
    }

    fn operation(&self) -> Option<OperationKind> {
        self.operation
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(name)
            .and_then(|value| value.to_str().ok())
    }

    fn errors(&self) -> &[RequestError] {
        &self.errors
    }
}

/// A link in the response path of a field, pointing towards the root.
pub trait PathLink {
    fn prev(&self) -> Option<&dyn PathLink>;
}

/// A field being resolved.
pub trait FieldDescriptor {
    fn field_name(&self) -> &str;

    fn parent_type(&self) -> &str;

    fn return_type(&self) -> &str;

    /// Path of the field in the response, `None` at the document root.
    fn path(&self) -> Option<&dyn PathLink>;
}

/// Owned response path.
///
/// Each node holds its segment and the path of its parent.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ResponsePath {
    pub segment: String,
    pub prev: Option<Box<ResponsePath>>,
}

impl ResponsePath {
    pub fn root(segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            prev: None,
        }
    }

    pub fn child(self, segment: impl Into<String>) -> Self {
        Self {
            segment: segment.into(),
            prev: Some(Box::new(self)),
        }
    }
}

impl PathLink for ResponsePath {
    fn prev(&self) -> Option<&dyn PathLink> {
        self.prev.as_deref().map(|prev| prev as &dyn PathLink)
    }
}

/// Owned field descriptor.
#[derive(Debug, Clone)]
pub struct ResolvedField {
    pub field_name: String,
    pub parent_type: String,
    pub return_type: String,
    pub path: Option<ResponsePath>,
}

impl FieldDescriptor for ResolvedField {
    fn field_name(&self) -> &str {
        &self.field_name
    }

    fn parent_type(&self) -> &str {
        &self.parent_type
    }

    fn return_type(&self) -> &str {
        &self.return_type
    }

    fn path(&self) -> Option<&dyn PathLink> {
        self.path.as_ref().map(|path| path as &dyn PathLink)
    }
}
