//! databutton-app-mcp
//!
//! Local proxy that exposes a Databutton app's endpoints as LLM tools by
//! bridging an MCP client's stdin/stdout to the app's websocket bridge.
//! Stdout carries relayed payloads only; everything else goes to stderr.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use dbmcp_core::{resolve, ConnectionTarget, FirebaseTokenExchanger};
use dbmcp_relay::{RelayConfig, RelaySession};

/// Environment variable consulted when no key file is given
const API_KEY_ENV_VAR: &str = "DATABUTTON_API_KEY";

#[derive(Parser)]
#[command(name = "databutton-app-mcp")]
#[command(version)]
#[command(about = "Expose Databutton app endpoints as LLM tools with MCP over websocket")]
#[command(after_help = format!(
    "Instead of providing an API key filepath with -k, you can set the {API_KEY_ENV_VAR} \
     environment variable.\n\nGo to https://databutton.com to build apps and get your API key."
))]
struct Args {
    /// File containing the API key
    #[arg(short = 'k', long)]
    apikeyfile: Option<PathBuf>,

    /// Run in verbose mode with info logging
    #[arg(short, long)]
    verbose: bool,

    /// Run in very verbose mode with debug logging
    #[arg(short, long)]
    debug: bool,

    /// Show the uri it would connect to and exit
    #[arg(long)]
    show_uri: bool,

    /// Use a custom uri for the MCP server endpoint
    #[arg(short, long)]
    uri: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // All diagnostics to stderr: stdout is reserved for relayed payloads.
    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else {
        "warn"
    };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| log_level.into()),
        ))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    tracing::info!("Starting Databutton app MCP proxy");

    let apikey = load_apikey(&args)?;

    let exchanger = FirebaseTokenExchanger::new();
    let mut target: ConnectionTarget = resolve(&apikey, &exchanger)
        .await
        .context("Failed to interpret API key")?;

    if let Some(uri) = args.uri {
        tracing::info!("Using override uri from command line: {}", uri);
        target.uri = uri;
    }

    if args.show_uri {
        println!("databutton-app-mcp would connect to:");
        println!("{}", target.uri);
        return Ok(());
    }

    // Termination signals cancel the session through an explicit token
    // rather than reaching into its internals.
    let cancel = CancellationToken::new();
    spawn_signal_listener(cancel.clone());

    let session = RelaySession::new(RelayConfig::default(), cancel.clone());
    session.run(&target).await?;

    if cancel.is_cancelled() {
        anyhow::bail!("Program terminated");
    }

    Ok(())
}

/// Resolve the API key from the file argument or the environment.
///
/// A key file that was named but does not exist falls back to the
/// environment variable; providing neither, or a blank value, is a fatal
/// configuration error before any network I/O.
fn load_apikey(args: &Args) -> Result<String> {
    let env_apikey = std::env::var(API_KEY_ENV_VAR).ok();

    if args.apikeyfile.is_none() && env_apikey.is_none() {
        anyhow::bail!("No API key provided");
    }

    let apikey = match &args.apikeyfile {
        Some(path) if path.exists() => {
            tracing::info!("Using api key from file {}", path.display());
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read API key from {}", path.display()))?
        }
        _ => {
            tracing::info!("Using api key from environment variable");
            env_apikey.unwrap_or_default()
        }
    };

    let apikey = apikey.trim().to_string();
    if apikey.is_empty() {
        anyhow::bail!("Provided API key is blank");
    }

    Ok(apikey)
}

/// Cancel the token on Ctrl+C or SIGTERM
fn spawn_signal_listener(cancel: CancellationToken) {
    tokio::spawn(async move {
        let ctrl_c = tokio::signal::ctrl_c();

        #[cfg(unix)]
        let terminate = async {
            match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
                Ok(mut signal) => {
                    signal.recv().await;
                }
                Err(e) => {
                    tracing::error!("Failed to install SIGTERM handler: {}", e);
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => {
                tracing::info!("Received Ctrl+C, closing connection...");
            }
            _ = terminate => {
                tracing::info!("Received SIGTERM, closing connection...");
            }
        }

        cancel.cancel();
    });
}
