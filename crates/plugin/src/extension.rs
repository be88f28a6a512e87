use std::any::TypeId;
use std::sync::Arc;

use async_graphql::extensions::{
    Extension, ExtensionContext, ExtensionFactory, NextExecute, NextParseQuery,
    NextPrepareRequest, NextRequest, NextResolve, NextValidation, ResolveInfo,
};
use async_graphql::parser::types::{ExecutableDocument, OperationType};
use async_graphql::{
    QueryPathNode, Request, Response, ServerError, ServerResult, ValidationResult, Value,
    Variables,
};
use http::HeaderMap;
use spin::Mutex;

use crate::context::{
    FieldDescriptor, OperationContext, OperationKind, PathLink, RequestError,
};
use crate::hooks::{ExecutionHooks, LifecycleHooks, RequestHooks};

/// HTTP headers of a request.
///
/// Attach them to the request data to make the `app` header visible to the metrics.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders(pub HeaderMap);

/// Records lifecycle metrics for every request executed by an `async-graphql` schema.
///
/// ```ignore
/// let schema = Schema::build(Query, EmptyMutation, EmptySubscription)
///     .extension(MetricsExtension::new(hooks))
///     .finish();
/// ```
pub struct MetricsExtension {
    hooks: LifecycleHooks,
}

impl MetricsExtension {
    pub fn new(hooks: LifecycleHooks) -> Self {
        Self { hooks }
    }
}

impl ExtensionFactory for MetricsExtension {
    fn create(&self) -> Arc<dyn Extension> {
        Arc::new(MetricsExtensionImpl {
            hooks: self.hooks.clone(),
            state: Default::default(),
        })
    }
}

#[derive(Default)]
struct State {
    context: OperationContext,
    request: Option<RequestHooks>,
    execution: Option<ExecutionHooks>,
}

struct MetricsExtensionImpl {
    hooks: LifecycleHooks,
    state: Mutex<State>,
}

#[async_trait::async_trait]
impl Extension for MetricsExtensionImpl {
    async fn request(&self, ctx: &ExtensionContext<'_>, next: NextRequest<'_>) -> Response {
        let resp = next.run(ctx).await;

        let mut state = self.state.lock();
        state.context.errors = resp.errors.iter().map(request_error).collect();
        if let Some(request) = &state.request {
            if !state.context.errors.is_empty() {
                request.did_encounter_errors(&state.context);
            }
            request.will_send_response(&state.context);
        }
        resp
    }

    async fn prepare_request(
        &self,
        ctx: &ExtensionContext<'_>,
        request: Request,
        next: NextPrepareRequest<'_>,
    ) -> ServerResult<Request> {
        {
            let mut state = self.state.lock();
            state.context.operation_name = request.operation_name.clone();
            if let Some(headers) = request_headers(&request).or_else(|| ctx.data_opt()) {
                state.context.headers = headers.0.clone();
            }
            let hooks = self.hooks.request_did_start(&state.context);
            state.request = Some(hooks);
        }
        next.run(ctx, request).await
    }

    async fn parse_query(
        &self,
        ctx: &ExtensionContext<'_>,
        query: &str,
        variables: &Variables,
        next: NextParseQuery<'_>,
    ) -> ServerResult<ExecutableDocument> {
        let phase = {
            let state = self.state.lock();
            state
                .request
                .as_ref()
                .map(|request| request.parsing_did_start(&state.context))
        };

        let res = next.run(ctx, query, variables).await;

        let mut state = self.state.lock();
        if let Ok(document) = &res {
            let operation = operation_kind(document, state.context.operation_name.as_deref());
            state.context.operation = operation;
        }
        if let Some(phase) = phase {
            phase.finish(&state.context, res.is_err());
        }
        res
    }

    async fn validation(
        &self,
        ctx: &ExtensionContext<'_>,
        next: NextValidation<'_>,
    ) -> Result<ValidationResult, Vec<ServerError>> {
        let phase = {
            let state = self.state.lock();
            state
                .request
                .as_ref()
                .map(|request| request.validation_did_start(&state.context))
        };

        let res = next.run(ctx).await;

        if let Some(phase) = phase {
            phase.finish(&self.state.lock().context, res.is_err());
        }
        res
    }

    async fn execute(
        &self,
        ctx: &ExtensionContext<'_>,
        operation_name: Option<&str>,
        next: NextExecute<'_>,
    ) -> Response {
        {
            let mut state = self.state.lock();
            let execution = state.request.as_ref().map(|request| {
                request.did_resolve_operation(&state.context);
                request.execution_did_start(&state.context)
            });
            state.execution = execution;
        }

        let resp = next.run(ctx, operation_name).await;

        let state = self.state.lock();
        if let Some(execution) = &state.execution {
            execution.execution_did_end(&state.context, !resp.errors.is_empty());
        }
        resp
    }

    async fn resolve(
        &self,
        ctx: &ExtensionContext<'_>,
        info: ResolveInfo<'_>,
        next: NextResolve<'_>,
    ) -> ServerResult<Option<Value>> {
        let field = ResolverField {
            name: info.name,
            parent_type: info.parent_type,
            return_type: info.return_type,
            path_node: info.path_node,
        };
        let timer = self
            .state
            .lock()
            .execution
            .as_ref()
            .map(ExecutionHooks::will_resolve_field);

        let res = next.run(ctx, info).await;

        if let Some(timer) = timer {
            timer.finish(&self.state.lock().context, &field);
        }
        res
    }
}

struct ResolverField<'a> {
    name: &'a str,
    parent_type: &'a str,
    return_type: &'a str,
    path_node: &'a QueryPathNode<'a>,
}

impl FieldDescriptor for ResolverField<'_> {
    fn field_name(&self) -> &str {
        self.name
    }

    fn parent_type(&self) -> &str {
        self.parent_type
    }

    fn return_type(&self) -> &str {
        self.return_type
    }

    fn path(&self) -> Option<&dyn PathLink> {
        Some(self.path_node as &dyn PathLink)
    }
}

impl PathLink for QueryPathNode<'_> {
    fn prev(&self) -> Option<&dyn PathLink> {
        self.parent.map(|parent| parent as &dyn PathLink)
    }
}

impl From<OperationType> for OperationKind {
    fn from(ty: OperationType) -> Self {
        match ty {
            OperationType::Query => OperationKind::Query,
            OperationType::Mutation => OperationKind::Mutation,
            OperationType::Subscription => OperationKind::Subscription,
        }
    }
}

/// Kind of the operation that will be executed.
fn operation_kind(
    document: &ExecutableDocument,
    operation_name: Option<&str>,
) -> Option<OperationKind> {
    document
        .operations
        .iter()
        .find(|(name, _)| match operation_name {
            Some(operation_name) => name.map(|name| name.as_str()) == Some(operation_name),
            None => true,
        })
        .map(|(_, operation)| operation.node.ty.into())
}

fn request_headers(request: &Request) -> Option<&RequestHeaders> {
    request
        .data
        .get(&TypeId::of::<RequestHeaders>())
        .and_then(|data| data.downcast_ref::<RequestHeaders>())
}

fn request_error(err: &ServerError) -> RequestError {
    let code = err
        .extensions
        .as_ref()
        .and_then(|extensions| extensions.get("code"))
        .and_then(|code| match code {
            Value::String(code) => Some(code.clone()),
            _ => None,
        });
    RequestError {
        message: err.message.clone(),
        code,
    }
}
