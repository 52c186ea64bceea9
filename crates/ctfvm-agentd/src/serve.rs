use std::sync::Arc;

use anyhow::Context;
use ctfvm_api::{HttpApi, LifecycleApiAdapter};
use ctfvm_catalog::FileCatalog;
use ctfvm_core::{LifecycleManager, MemoryRuntime, Runtime, init_uptime};
use ctfvm_docker::DockerRuntime;
use ctfvm_prometheus::PrometheusMetrics;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::config::{RuntimeKind, ServeArgs};

pub async fn run(args: ServeArgs) -> anyhow::Result<()> {
    init_uptime();

    let catalog = FileCatalog::load(&args.catalog_path)
        .with_context(|| format!("load catalog {}", args.catalog_path.display()))?;

    let runtime: Arc<dyn Runtime> = match args.runtime {
        RuntimeKind::Docker => Arc::new(DockerRuntime::connect().await?),
        RuntimeKind::Memory => {
            warn!("memory runtime selected; no containers will be started");
            Arc::new(MemoryRuntime::new())
        }
    };

    let metrics = PrometheusMetrics::new()?;
    let manager = LifecycleManager::new(runtime, args.lifecycle(), Arc::new(metrics.clone()));
    let adapter = Arc::new(LifecycleApiAdapter::new(Arc::new(catalog), manager.clone()));
    let router = HttpApi::new(adapter).with_metrics(metrics).router();

    let listener = TcpListener::bind(("0.0.0.0", args.port))
        .await
        .with_context(|| format!("bind port {}", args.port))?;
    info!(port = args.port, "listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("http server")?;

    manager.shutdown();
    info!("server exited");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl-c handler unavailable");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "SIGTERM handler unavailable");
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
    info!("shutting down");
}
