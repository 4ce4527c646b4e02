//! drive_gateway - Serve drive file operations as tools or over HTTP.

use std::net::SocketAddr;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use drive_gateway::http::{self, ServerConfig};
use drive_gateway::mcp::DriveTools;
use drive_gateway::{FileOperations, GraphClient};

/// Gateway exposing drive list, upload and download operations.
#[derive(Parser)]
#[command(name = "drive_gateway")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Base URL of the Microsoft Graph API.
    #[arg(
        long,
        env = "GRAPH_BASE_URL",
        default_value = drive_gateway::client::GRAPH_API_BASE
    )]
    graph_base_url: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve listFiles, uploadFile and downloadFile as tools over stdio.
    Mcp {
        /// Bearer token used for every remote call.
        #[arg(long, env = "GRAPH_ACCESS_TOKEN", hide_env_values = true)]
        access_token: String,
    },

    /// Serve the REST API and push notifications.
    Serve {
        /// Address to listen on.
        #[arg(long, env = "DRIVE_GATEWAY_BIND", default_value = "127.0.0.1:3000")]
        bind: SocketAddr,

        /// Include error details in responses.
        #[arg(long, env = "DRIVE_GATEWAY_DEV")]
        dev: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout stays free for the tool protocol.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let files = FileOperations::new(GraphClient::with_base_url(cli.graph_base_url));

    match cli.command {
        Commands::Mcp { access_token } => {
            if access_token.trim().is_empty() {
                anyhow::bail!("GRAPH_ACCESS_TOKEN is empty");
            }

            info!("tool server running on stdio");
            let service = DriveTools::new(files, access_token)
                .serve(stdio())
                .await
                .map_err(|e| anyhow::anyhow!("Failed to start tool server: {}", e))?;
            service
                .waiting()
                .await
                .context("Tool server terminated abnormally")?;
        }

        Commands::Serve { bind, dev } => {
            http::serve(ServerConfig { bind, dev_mode: dev }, files)
                .await
                .with_context(|| format!("REST server on {} failed", bind))?;
        }
    }

    Ok(())
}
