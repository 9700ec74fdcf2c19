use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{fmt, EnvFilter};

use groove_workspace_lib::{
    DiscoveryOptions, NotifierOptions, ServiceConfig, DEFAULT_SERVICE_HOST, DEFAULT_SERVICE_PORT,
};

/// Groove workspace service: resolves workspace roots and streams their changes
#[derive(Parser, Debug)]
#[command(name = "groove-workspace-service")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Host name or IP address to bind to
    #[arg(long, env = "GROOVE_SERVICE_HOST", default_value = DEFAULT_SERVICE_HOST)]
    host: String,

    /// Port to listen on
    #[arg(short, long, env = "GROOVE_SERVICE_PORT", default_value_t = DEFAULT_SERVICE_PORT)]
    port: u16,

    /// Interval between snapshot polls of watched paths
    #[arg(long, env = "GROOVE_POLL_INTERVAL_MS", default_value_t = 1800)]
    poll_interval_ms: u64,

    /// Interval between heartbeat comments on idle streams
    #[arg(long, env = "GROOVE_HEARTBEAT_SECS", default_value_t = 25)]
    heartbeat_secs: u64,

    /// Rely on polling only, without native filesystem notifications
    #[arg(long)]
    no_native_watch: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    fmt().with_env_filter(filter).with_writer(std::io::stderr).init();

    let config = ServiceConfig {
        discovery: Arc::new(DiscoveryOptions::default()),
        notifier: NotifierOptions {
            poll_interval: Duration::from_millis(args.poll_interval_ms.max(100)),
            heartbeat_interval: Duration::from_secs(args.heartbeat_secs.max(1)),
            native_watch: !args.no_native_watch,
            ..NotifierOptions::default()
        },
    };
    tracing::debug!(
        "[service] discovery bases: {:?}",
        config.discovery.search_bases
    );

    tokio::select! {
        result = groove_workspace_lib::run(&args.host, args.port, config) => {
            result.with_context(|| {
                format!("workspace service on {}:{} stopped", args.host, args.port)
            })?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("[service] shutting down");
        }
    }

    Ok(())
}
