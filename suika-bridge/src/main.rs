//! Suika hardware sensor bridge.

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use tokio::runtime::Runtime;
use tokio::sync::watch;
use tracing::{error, info};

use suika_bridge::config::InputSource;
use suika_bridge::{AppState, BridgeConfig, HttpServer, Ingestor, command_channel, exchange};
use suika_common::{Counters, Uptime};

/// How long runtime shutdown waits on blocking work. A stdin read parked on
/// the blocking pool cannot be cancelled and must not hold the process open.
const RUNTIME_SHUTDOWN_GRACE: Duration = Duration::from_millis(500);

/// Serve hardware sensor frames as JSON over HTTP.
#[derive(Parser, Debug)]
#[command(name = "suika-bridge")]
#[command(about = "Serve hardware sensor frames as JSON over HTTP")]
#[command(version)]
struct Args {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long)]
    config: Option<String>,

    /// HTTP listen address (overrides config).
    #[arg(long)]
    listen: Option<String>,

    /// Input source (overrides config).
    #[arg(long, value_enum)]
    input: Option<InputSource>,

    /// Log level (overrides config).
    #[arg(long)]
    log_level: Option<String>,
}

async fn wait_for_signal() -> anyhow::Result<()> {
    #[cfg(unix)]
    {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;
        tokio::select! {
            result = tokio::signal::ctrl_c() => {
                result?;
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }
    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C, shutting down...");
    }
    Ok(())
}

fn build_runtime() -> std::io::Result<Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let runtime = build_runtime()?;
    let result = runtime.block_on(run(args));
    runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
    result
}

async fn run(args: Args) -> anyhow::Result<()> {
    let mut config = if let Some(config_path) = &args.config {
        BridgeConfig::load_from_file(config_path)?
    } else {
        BridgeConfig::default()
    };

    if let Some(listen) = args.listen {
        config.server.listen = listen;
    }
    if let Some(input) = args.input {
        config.input.source = input;
    }
    if let Some(level) = args.log_level {
        config.logging.level = level;
    }
    config.validate()?;

    suika_common::init_tracing(&config.logging)?;

    info!(version = env!("CARGO_PKG_VERSION"), "Starting Suika bridge");

    let listen_addr: SocketAddr = config
        .server
        .listen
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid listen address: {}", e))?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let uptime = Uptime::start();
    let (writer, reader) = exchange();
    let (command_tx, command_rx) = command_channel();

    let ingestor = Ingestor::new(writer, command_rx, uptime, config.input.clone());
    let http_server = HttpServer::new(
        AppState::new(
            reader,
            command_tx,
            uptime,
            config.server.advertise_ip.as_str(),
            config.server.stale_timeout_ms,
        ),
        listen_addr,
    );

    let ingest_shutdown = shutdown_rx.clone();
    let mut ingest_task = tokio::spawn(async move {
        match ingestor.run(ingest_shutdown).await {
            Ok(counters) => Some(counters),
            Err(e) => {
                error!("Ingestion error: {}", e);
                None
            }
        }
    });

    let http_shutdown = shutdown_rx.clone();
    let mut http_task = tokio::spawn(async move {
        if let Err(e) = http_server.run(http_shutdown).await {
            error!("HTTP server error: {}", e);
        }
    });

    // Either task failing early (e.g. a bind error) also stops the bridge.
    let mut final_counters: Option<Counters> = None;
    let mut ingest_done = false;
    let mut http_done = false;
    tokio::select! {
        result = wait_for_signal() => result?,
        joined = &mut ingest_task => {
            final_counters = joined.ok().flatten();
            ingest_done = true;
        }
        _ = &mut http_task => {
            http_done = true;
        }
    }

    shutdown_tx.send(true)?;

    let _ = tokio::time::timeout(Duration::from_secs(5), async {
        if !ingest_done {
            final_counters = ingest_task.await.ok().flatten();
        }
        if !http_done {
            let _ = http_task.await;
        }
    })
    .await;

    if let Some(counters) = final_counters {
        info!(
            frames_seen = counters.frames_seen,
            frames_accepted = counters.frames_accepted,
            frames_rejected = counters.frames_rejected,
            frames_dropped = counters.frames_dropped,
            "Final statistics"
        );
    }

    info!("Bridge stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[test]
    fn test_runtime_shutdown_does_not_wait_on_blocking_read() {
        let runtime = build_runtime().unwrap();
        let (_producer, pending) = std::sync::mpsc::channel::<()>();
        runtime.spawn_blocking(move || {
            // Stands in for a stdin read that never completes.
            let _ = pending.recv();
        });

        let started = Instant::now();
        runtime.shutdown_timeout(RUNTIME_SHUTDOWN_GRACE);
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_args_input_override() {
        let args = Args::try_parse_from(["suika-bridge", "--input", "tcp"]).unwrap();
        assert_eq!(args.input, Some(InputSource::Tcp));
        assert!(args.config.is_none());
    }
}
