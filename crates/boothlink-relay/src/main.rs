//! boothlink-relay binary.

use std::path::PathBuf;

use boothlink_common::BoothlinkError;
use clap::Parser;

#[derive(Parser)]
#[command(
    name = "boothlink-relay",
    version,
    about = "WebSocket relay Hub for photo booth sessions"
)]
struct Args {
    /// Path to a TOML config file (defaults to the platform config dir).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Address to bind, overriding the config file.
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on, overriding the config file and PORT.
    #[arg(short, long)]
    port: Option<u16>,

    /// Log level or filter directive (e.g. "debug").
    #[arg(long)]
    log_level: Option<String>,

    /// Write a commented default config to this path and exit.
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), BoothlinkError> {
    let args = Args::parse();

    if let Some(path) = &args.init_config {
        init_tracing(args.log_level.as_deref().unwrap_or("info"));
        boothlink_config::toml_loader::create_default_config(path)?;
        return Ok(());
    }

    let mut config = boothlink_config::load_config(args.config.as_deref())?;

    let level = args
        .log_level
        .clone()
        .unwrap_or_else(|| config.logging.level.clone());
    init_tracing(&level);

    // The loader ran before logging existed; surface its findings now.
    if let Err(e) = boothlink_config::validation::validate(&config) {
        tracing::warn!(error = %e, "Config has invalid values");
    }

    if let Some(host) = args.host {
        config.hub.host = host;
    }
    if let Some(port) = args.port {
        config.hub.port = port;
    }

    let handle = boothlink_relay::start(&config).await?;
    let token = handle.shutdown_token();

    tokio::spawn(async move {
        shutdown_signal().await;
        tracing::info!("Shutdown signal received");
        token.cancel();
    });

    handle.wait().await?;
    Ok(())
}

fn init_tracing(level: &str) {
    let directive = if level.contains('=') {
        level.to_string()
    } else {
        format!("warn,boothlink_relay={level},boothlink_config={level}")
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| directive.into()),
        )
        .init();
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "Failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                let _ = signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {}
        () = terminate => {}
    }
}
