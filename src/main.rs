#![forbid(unsafe_code)]

mod config;
mod options;
mod schema;

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_graphql::http::{playground_source, GraphQLPlaygroundConfig};
use async_graphql_warp::GraphQLResponse;
use futures_util::FutureExt;
use graphmeter_plugin::{LifecycleHooks, RequestHeaders, SharedRecorder};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use structopt::StructOpt;
use tokio::signal;
use tokio::time::Duration;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};
use warp::http::{HeaderMap, Response as HttpResponse};
use warp::{Filter, Rejection, Reply};

use config::Config;
use options::Options;
use schema::{AppSchema, ServiceName};

// Use Jemalloc only for musl-64 bits platforms
#[cfg(all(target_env = "musl", target_pointer_width = "64"))]
#[global_allocator]
static ALLOC: jemallocator::Jemalloc = jemallocator::Jemalloc;

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

fn init_tracing() {
    tracing_subscriber::registry()
        .with(fmt::layer().compact().with_target(false))
        .with(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new("info"))
                .unwrap(),
        )
        .init();
}

fn init_recorder(config: &Config) -> Result<(SharedRecorder, PrometheusHandle)> {
    let mut builder = PrometheusBuilder::new();
    if let Some(buckets) = &config.duration_buckets {
        tracing::info!(buckets = ?buckets, "Custom duration buckets");
        builder = builder
            .set_buckets_for_metric(Matcher::Suffix("_seconds".to_string()), buckets)
            .context("Invalid duration buckets.")?;
    }
    let recorder = builder.build_recorder();
    let handle = recorder.handle();
    tokio::spawn(run_upkeep(handle.clone(), UPKEEP_INTERVAL));
    let recorder: SharedRecorder = Arc::new(recorder);
    Ok((recorder, handle))
}

/// Drains histogram samples into the exporter's summaries and buckets.
async fn run_upkeep(handle: PrometheusHandle, period: Duration) {
    let mut interval = tokio::time::interval(period);
    loop {
        interval.tick().await;
        handle.run_upkeep();
    }
}

pub fn graphql(
    schema: AppSchema,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    async_graphql_warp::graphql(schema)
        .and(warp::header::headers_cloned())
        .and_then(
            |(schema, request): (AppSchema, async_graphql::Request),
             headers: HeaderMap| async move {
                let resp = schema.execute(request.data(RequestHeaders(headers))).await;
                Ok::<_, Infallible>(GraphQLResponse::from(resp))
            },
        )
}

pub fn graphql_playground() -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::get().map(|| {
        HttpResponse::builder()
            .header("content-type", "text/html")
            .body(playground_source(GraphQLPlaygroundConfig::new("/")))
    })
}

pub fn metrics(
    handle: PrometheusHandle,
) -> impl Filter<Extract = (impl Reply,), Error = Rejection> + Clone {
    warp::path!("metrics")
        .and(warp::get())
        .map(move || handle.render())
}

#[tokio::main]
async fn main() -> Result<()> {
    let options: Options = Options::from_args();
    init_tracing();

    let config = toml::from_str::<Config>(
        &std::fs::read_to_string(&options.config)
            .with_context(|| format!("Failed to load config file '{}'.", options.config))?,
    )
    .with_context(|| format!("Failed to parse config file '{}'.", options.config))?;

    let (recorder, handle) = init_recorder(&config)?;
    let registry = Arc::new(config.create_registry_builder(recorder).build());
    let hooks = match &config.version {
        Some(version) => {
            LifecycleHooks::with_version(registry, config.service.clone(), version.clone())
        }
        None => LifecycleHooks::new(registry, config.service.clone()),
    };
    let schema = schema::build_schema(hooks.clone(), ServiceName(config.service.clone()));

    let bind_addr: SocketAddr = config
        .bind
        .parse()
        .context(format!("Failed to parse bind addr '{}'", config.bind))?;

    let routes = warp::path::end()
        .and(graphql(schema).or(graphql_playground()))
        .or(warp::path!("health").map(|| warp::reply::json(&"healthy")))
        .or(metrics(handle));

    hooks.server_will_start();
    let (addr, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(bind_addr, signal::ctrl_c().map(|_| ()))
        .with_context(|| format!("Failed to bind '{}'", bind_addr))?;
    tracing::info!(addr = %addr, service = %config.service, "Listening");
    server.await;
    hooks.server_will_stop();
    tracing::info!("Server shutdown");

    Ok(())
}
