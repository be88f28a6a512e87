use async_graphql::{
    Context, EmptySubscription, Error, ErrorExtensions, Object, Result, Schema, SimpleObject, ID,
};
use graphmeter_plugin::{LifecycleHooks, MetricsExtension};

pub type AppSchema = Schema<QueryRoot, MutationRoot, EmptySubscription>;

pub fn build_schema(hooks: LifecycleHooks, service: ServiceName) -> AppSchema {
    Schema::build(QueryRoot, MutationRoot, EmptySubscription)
        .data(service)
        .extension(MetricsExtension::new(hooks))
        .finish()
}

#[derive(SimpleObject)]
pub struct User {
    id: ID,
    username: String,
}

pub struct QueryRoot;

#[Object]
impl QueryRoot {
    async fn me(&self) -> User {
        User {
            id: "1234".into(),
            username: "Me".to_string(),
        }
    }

    async fn user(&self, id: ID) -> Result<User> {
        if id.is_empty() {
            return Err(
                Error::new("User id must not be empty.")
                    .extend_with(|_, e| e.set("code", "BAD_USER_INPUT")),
            );
        }
        let username = format!("User {}", id.as_str());
        Ok(User { id, username })
    }

    async fn service(&self, ctx: &Context<'_>) -> String {
        ctx.data_opt::<ServiceName>()
            .map(|name| name.0.clone())
            .unwrap_or_default()
    }
}

pub struct MutationRoot;

#[Object]
impl MutationRoot {
    async fn login(&self, username: String, password: String) -> Result<User> {
        if password != "secret" {
            return Err(Error::new("Invalid credentials.")
                .extend_with(|_, e| e.set("code", "INVALID_CREDENTIALS")));
        }
        Ok(User {
            id: "1234".into(),
            username,
        })
    }
}

/// Name of the service, available to resolvers.
pub struct ServiceName(pub String);
