//! CNI bridge service
//!
//! Docker remote network driver that attaches containers to networks by
//! running CNI plugins:
//! - Remote driver API on a unix socket
//! - Docker event watcher keeping the container/network cache current
//! - CNI plugin execution on Join

use anyhow::{Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};

use cb_core::RuntimeClient;
use cb_docker::DockerRuntime;
use cb_http::{RouterBuilder, UnixSocketServer};
use cb_network::{create_router, DriverConfig, NetworkDriver};
use cb_plugins::ExecInvoker;
use cb_state::{StateCache, Watcher};

mod cli;

use cli::Args;

const LOG_TARGETS: &[&str] = &[
    "cni_bridge_service",
    "cb_network",
    "cb_state",
    "cb_plugins",
    "cb_http",
    "cb_docker",
    "tower_http",
];

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment from /etc/cni-bridge/environment (if exists)
    let env_report = cb_core::config::load_environment();

    let args = Args::parse();
    init_tracing(args.debug, args.log_json)?;
    env_report.log();

    let config = args.into_config();
    config.validate()?;

    if let Err(e) = run(config).await {
        error!("{:#}", e);
        return Err(e);
    }
    Ok(())
}

/// RUST_LOG replaces the default directives when set
fn init_tracing(debug: bool, json: bool) -> Result<()> {
    use tracing_subscriber::EnvFilter;

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => {
            let level = if debug { "debug" } else { "info" };
            let mut filter = EnvFilter::new("warn");
            for target in LOG_TARGETS {
                filter = filter.add_directive(format!("{}={}", target, level).parse()?);
            }
            filter
        }
    };

    let subscriber = tracing_subscriber::fmt().with_env_filter(filter);
    if json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
    Ok(())
}

async fn run(config: cb_core::BridgeConfig) -> Result<()> {
    info!("Starting CNI bridge {}", env!("CARGO_PKG_VERSION"));

    // --- 1. Runtime and cache ---

    let runtime: Arc<dyn RuntimeClient> = Arc::new(
        DockerRuntime::connect(&config.docker_host)
            .await
            .context("Docker is not reachable")?,
    );

    let cache = StateCache::new();
    let mut watcher = Watcher::start(runtime.clone(), cache.clone())
        .await
        .context("Failed to start the Docker event watcher")?;
    info!(
        "Watching Docker events, {} networks known",
        cache.network_count().await
    );

    // --- 2. Driver ---

    let invoker = Arc::new(ExecInvoker::new(&config.plugin_dir, config.plugin_timeout));
    info!(
        "Running CNI plugins from {} (timeout {:?})",
        config.plugin_dir.display(),
        config.plugin_timeout
    );

    let driver = Arc::new(NetworkDriver::new(
        DriverConfig {
            version: env!("CARGO_PKG_VERSION").to_string(),
            register_timeout: config.register_timeout,
            netconf_dir: config.netconf_dir.clone(),
        },
        cache,
        runtime,
        invoker,
    ));

    // --- 3. Socket server ---

    let router = RouterBuilder::new()
        .merge("network-driver", create_router(driver.clone()))
        .build();

    let server = UnixSocketServer::builder()
        .socket_path(&config.socket_path)
        .router(router)
        .bind()
        .with_context(|| format!("Failed to bind {}", config.socket_path.display()))?;

    // --- 4. Run until signalled ---

    // A watcher that ends on its own leaves the cache frozen, so it takes
    // the server down with it and the process exits non-zero.
    let mut watcher_exit = None;
    server
        .serve_with_shutdown(async {
            tokio::select! {
                _ = shutdown_signal() => {}
                exit = watcher.finished() => watcher_exit = Some(exit),
            }
        })
        .await;

    driver.shutdown();
    watcher.stop().await;

    if let Some(exit) = watcher_exit {
        anyhow::bail!("Docker event watcher ended unexpectedly: {}", exit);
    }
    info!("CNI bridge stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {}", e);
            std::future::pending::<()>().await;
        }
    };

    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    tokio::select! {
        _ = ctrl_c => info!("Received ctrl-c"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
