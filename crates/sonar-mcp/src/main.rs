use anyhow::Result;
use clap::{Parser, Subcommand};
use sonar_core::ToolKind;
use std::sync::Arc;
use std::time::Duration;

mod config;
mod mcp;

#[derive(Parser, Debug)]
#[command(name = "sonar-mcp", version)]
#[command(
    about = "Perplexity web-search and deep-research tools over MCP stdio",
    long_about = "Perplexity web-search and deep-research tools over MCP stdio.\n\nWith no subcommand, serves MCP over stdin/stdout. Requires PERPLEXITY_API_KEY."
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run as an MCP stdio server (the default).
    Serve,
    /// Diagnose configuration (json; no secrets).
    Doctor,
    /// Print version info (json).
    Version,
}

const CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// Log to stderr only: stdout carries the MCP stream.
fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_from_env("SONAR_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(filter)
        .init();
}

async fn run_server() -> Result<()> {
    let cfg = config::Config::from_env()?;
    let http = reqwest::Client::builder()
        .user_agent(concat!("sonar-mcp/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(CONNECT_TIMEOUT)
        .build()?;
    let client = sonar_client::PerplexityClient::new(http, cfg.api_key, &cfg.endpoint)?;
    tracing::info!(
        endpoint = client.endpoint(),
        default_max_tokens = cfg.defaults.max_tokens,
        default_temperature = cfg.defaults.temperature,
        "starting sonar-mcp"
    );
    let svc = mcp::SonarMcp::new(Arc::new(client), cfg.defaults);
    mcp::serve_stdio(svc)
        .await
        .map_err(|e| anyhow::anyhow!(e.message.to_string()))?;
    tracing::info!("client closed; shutting down");
    Ok(())
}

fn doctor() -> serde_json::Value {
    let defaults = config::defaults_from_env();
    let tools: Vec<serde_json::Value> = ToolKind::ALL
        .iter()
        .map(|k| {
            serde_json::json!({
                "name": k.tool_name(),
                "model": k.model(),
                "limits": k.limits(),
            })
        })
        .collect();
    serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "configured": {
            "perplexity_api_key": config::api_key_from_env().is_some(),
        },
        "endpoint": config::endpoint_from_env(),
        "defaults": defaults.as_ref().ok(),
        "defaults_error": defaults.as_ref().err().map(|e| e.to_string()),
        "tools": tools,
    })
}

#[tokio::main]
async fn main() -> Result<()> {
    config::load_env_file();
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => {
            init_logging();
            if let Err(e) = run_server().await {
                tracing::error!(error = %e, "sonar-mcp exiting");
                std::process::exit(1);
            }
        }
        Commands::Doctor => {
            println!("{}", serde_json::to_string_pretty(&doctor())?);
        }
        Commands::Version => {
            println!(
                "{}",
                serde_json::json!({
                    "name": env!("CARGO_PKG_NAME"),
                    "version": env!("CARGO_PKG_VERSION"),
                })
            );
        }
    }
    Ok(())
}
