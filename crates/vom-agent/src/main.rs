//! vomd entry point.
//!
//! Connects to the forwarding engine, reconciles it against the desired-state
//! file and keeps it alive until interrupted.

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use vom_agent::daemon::{VomDaemon, VomDaemonConfig};
use vom_api::SimEngine;
use vom_core::ConnectionConfig;

/// VOM reconciliation daemon
#[derive(Parser, Debug)]
#[command(name = "vomd")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'l', long, default_value = "info")]
    log_level: String,

    /// Liveness poll interval in milliseconds
    #[arg(long, default_value = "5000")]
    poll_interval: u64,

    /// Deadline for a single engine request in milliseconds
    #[arg(long, default_value = "5000")]
    rpc_timeout_ms: u64,

    /// Owner key the engine's existing state is imported under
    #[arg(long, default_value = "__boot__")]
    boot_key: String,

    /// Desired-state JSON file applied at boot
    #[arg(short = 'd', long)]
    desired_state: Option<PathBuf>,

    /// Print the object model after boot reconciliation and exit
    #[arg(long)]
    dump: bool,
}

fn daemon_config(args: &Args) -> VomDaemonConfig {
    let rpc_timeout = Duration::from_millis(args.rpc_timeout_ms);
    VomDaemonConfig {
        poll_interval_ms: args.poll_interval,
        boot_key: args.boot_key.clone(),
        desired_state: args.desired_state.clone(),
        connection: ConnectionConfig {
            rpc_timeout,
            dump_timeout: rpc_timeout,
            ..ConnectionConfig::default()
        },
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = daemon_config(&args);
    info!("Poll interval: {}ms", config.poll_interval_ms);
    info!("Boot key: {}", config.boot_key);
    if let Some(path) = &config.desired_state {
        info!("Desired state: {}", path.display());
    }

    // the in-process engine stands in for a remote one
    let engine = Arc::new(SimEngine::new());
    let daemon = Arc::new(VomDaemon::new(config, engine));

    let boot = Arc::clone(&daemon);
    let rc = tokio::task::spawn_blocking(move || boot.start())
        .await
        .context("boot task failed")?
        .context("boot reconciliation failed")?;
    if !rc.is_ok() {
        warn!("Boot reconciliation finished with {}", rc);
    }

    if args.dump {
        print!("{}", daemon.dump());
        daemon.shutdown();
        return Ok(());
    }

    let signal_daemon = Arc::clone(&daemon);
    let shutdown_handle = tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Received SIGINT, shutting down gracefully...");
                signal_daemon.stop();
            }
            Err(err) => {
                error!("Failed to listen for ctrl-c: {}", err);
            }
        }
    });

    Arc::clone(&daemon).run().await;
    shutdown_handle.abort();

    tokio::task::spawn_blocking(move || daemon.shutdown())
        .await
        .context("shutdown task failed")?;
    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&args.log_level))
        .init();

    info!("====================================================================");
    info!("Starting vomd");
    info!("====================================================================");

    match run(args).await {
        Ok(()) => {
            info!("vomd shutdown complete");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("vomd failed: {:#}", e);
            ExitCode::FAILURE
        }
    }
}
