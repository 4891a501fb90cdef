// src/main.rs
use anyhow::{Context, Result};
use hyper::header::{self, HeaderValue};
use hyper::{Body, Request, Response, Server, StatusCode};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info, warn};

use uptime_sentinel::{
    api::Api,
    config::{self, Config, StorageBackend},
    metrics::MetricsRegistry,
    monitor::Scheduler,
    probe::{HttpProbe, ProbeExecutor},
    server::{RequestHandler, ServerBuilder},
    storage::{FileSink, MemorySink, ResultSink},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("uptime_sentinel=debug".parse()?)
                .add_directive("hyper=info".parse()?),
        )
        .init();

    let config = config::load_config_with_fallback(std::env::args().nth(1)).await?;

    // Initialize metrics
    let metrics_registry = MetricsRegistry::new()?;
    let metrics = metrics_registry.collector();

    let sink = open_sink(&config).await?;

    // Start metrics server if enabled
    if config.metrics.enabled {
        let metrics_addr: SocketAddr = ([0, 0, 0, 0], config.metrics.port).into();
        start_metrics_server(metrics_addr, metrics_registry, config.metrics.path.clone()).await?;
    }

    let probe = HttpProbe::new(config.monitor.timeout()).context("Failed to create HTTP client")?;
    let executor = ProbeExecutor::new(Arc::new(probe)).with_timeout(config.monitor.timeout());

    let scheduler = Arc::new(
        Scheduler::new(executor, sink.clone(), Some(metrics.clone()))
            .with_interval(config.monitor.interval()),
    );
    for target in &config.targets {
        scheduler.add_target(target.as_str());
    }
    scheduler
        .start()
        .await
        .context("Failed to start monitor scheduler")?;

    let api = Arc::new(Api::new(scheduler.clone(), sink, Some(metrics)));
    let handler = RequestHandler::new(api);

    let served = ServerBuilder::new(config.server.listen_addr)
        .with_handler(handler)
        .serve_with_shutdown(shutdown_signal())
        .await;

    // Drain the in-flight cycle even if the listener failed.
    scheduler.stop().await;
    served?;

    info!("Shutdown complete");
    Ok(())
}

async fn open_sink(config: &Config) -> Result<Arc<dyn ResultSink>> {
    let sink: Arc<dyn ResultSink> = match config.storage.backend {
        StorageBackend::File => {
            let sink = FileSink::open(&config.storage.path)
                .await
                .with_context(|| {
                    format!("Failed to open result file {}", config.storage.path.display())
                })?;
            Arc::new(sink)
        }
        StorageBackend::Memory => {
            warn!("Using in-memory storage; check history is lost on restart");
            Arc::new(MemorySink::new())
        }
    };
    Ok(sink)
}

async fn start_metrics_server(
    addr: SocketAddr,
    registry: MetricsRegistry,
    path: String,
) -> Result<()> {
    let registry = Arc::new(registry);
    let metrics_path = Arc::new(path);
    let service_path = metrics_path.clone();

    let make_service = hyper::service::make_service_fn(move |_| {
        let registry = registry.clone();
        let path = service_path.clone();

        async move {
            Ok::<_, Infallible>(hyper::service::service_fn(move |req: Request<Body>| {
                let registry = registry.clone();
                let path = path.clone();

                async move {
                    if req.uri().path() != path.as_str() {
                        return Ok::<_, Infallible>(text_response(
                            StatusCode::NOT_FOUND,
                            Body::from("Not Found"),
                        ));
                    }

                    let response = match registry.gather() {
                        Ok(metrics) => {
                            let mut response = text_response(StatusCode::OK, Body::from(metrics));
                            response.headers_mut().insert(
                                header::CONTENT_TYPE,
                                HeaderValue::from_static("text/plain; version=0.0.4"),
                            );
                            response
                        }
                        Err(e) => {
                            error!("Failed to encode metrics: {}", e);
                            text_response(StatusCode::INTERNAL_SERVER_ERROR, Body::empty())
                        }
                    };
                    Ok::<_, Infallible>(response)
                }
            }))
        }
    });

    let server = Server::try_bind(&addr)
        .with_context(|| format!("Failed to bind metrics listener on {}", addr))?
        .serve(make_service);

    info!(
        "Metrics server listening on http://{}{}",
        addr,
        metrics_path.as_str()
    );

    tokio::spawn(async move {
        if let Err(e) = server.await {
            error!("Metrics server error: {}", e);
        }
    });

    Ok(())
}

fn text_response(status: StatusCode, body: Body) -> Response<Body> {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response
}

// Graceful shutdown handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
