mod config;
mod handlers;
mod state;

use std::net::SocketAddr;
use std::process;
use std::sync::Arc;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use esexporter_core::source::{GrpcSource, HttpSource, SourceReader};
use esexporter_core::{SourceError, StatsCollector};

use config::{Args, ClusterMode, Config, StreamReads};
use state::AppState;

fn init_logging(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::INFO };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("esexporter={}", level).parse().unwrap())
        .add_directive(format!("esexporter_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

fn main() {
    let args = Args::parse();
    init_logging(args.verbose);

    let config = match args.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "invalid configuration");
            process::exit(2);
        }
    };

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .expect("failed to build tokio runtime")
        .block_on(async_main(config));
}

async fn async_main(config: Config) {
    info!(
        version = esexporter_core::VERSION,
        url = %config.source.url,
        timeout_ms = config.timeout.as_millis() as u64,
        cluster_mode = ?config.cluster_mode,
        stream_reads = ?config.stream_reads,
        parked_messages_stats = config.collector.parked_messages_stats,
        tcp_connection_stats = config.collector.tcp_connection_stats,
        streams = ?config.collector.streams,
        "esexporter starting"
    );

    match config.stream_reads {
        StreamReads::Grpc => serve(GrpcSource::new(&config.source), config).await,
        StreamReads::AtomPub => serve(HttpSource::new(&config.source), config).await,
    }
}

async fn serve<S: SourceReader + 'static>(source: Result<S, SourceError>, config: Config) {
    let source = match source {
        Ok(source) => source,
        Err(e) => {
            error!(error = %e, "failed to create EventStoreDB client");
            process::exit(1);
        }
    };

    let state = Arc::new(AppState {
        collector: StatsCollector::new(source, config.collector),
        timeout: config.timeout,
        cluster_mode: config.cluster_mode == ClusterMode::Cluster,
    });
    let app = handlers::build_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!(%addr, error = %e, "failed to bind");
            process::exit(1);
        }
    };
    info!(%addr, "listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!(error = %e, "server error");
        process::exit(1);
    }
    info!("stopped");
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("received shutdown signal");
}
