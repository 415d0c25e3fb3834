//! Engram MCP Daemon
//!
//! Long-running developer-memory service speaking MCP over stdio.
//! Startup order: logging → data dir → migrations → composition root →
//! capture worker → transport loop.

mod protocol;
mod provider;
mod server;
mod tools;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use directories::ProjectDirs;
use tracing::info;
use tracing_subscriber::EnvFilter;

use engram_core::migrate::{run_migrations, MigrationContext};

use crate::protocol::StdioTransport;
use crate::server::{McpServer, ServiceContext};

/// Developer-memory MCP daemon
#[derive(Debug, Parser)]
#[command(name = "engram-mcp", version, about)]
struct Args {
    /// Custom data directory (defaults to the platform data dir)
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Working tree this daemon serves; anchors branch detection and
    /// session-summary re-indexing
    #[arg(long)]
    workspace: Option<PathBuf>,
}

fn default_data_dir() -> anyhow::Result<PathBuf> {
    let dirs = ProjectDirs::from("com", "engram", "engram")
        .context("could not determine platform data directory")?;
    Ok(dirs.data_dir().to_path_buf())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Logs go to stderr; stdout carries JSON-RPC
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let data_dir = match args.data_dir {
        Some(dir) => dir,
        None => default_data_dir()?,
    };
    std::fs::create_dir_all(&data_dir)
        .with_context(|| format!("could not create data dir {}", data_dir.display()))?;
    info!(data_dir = %data_dir.display(), "engram-mcp v{} starting", env!("CARGO_PKG_VERSION"));

    // Provider is chosen from the default config at startup; the
    // configure operation can change the config field, but rewiring the
    // provider requires a restart.
    let provider_kind = engram_core::RuntimeConfig::default().llm_provider;
    let provider = provider::provider_for(provider_kind);

    let ctx = Arc::new(
        ServiceContext::new(data_dir.clone(), args.workspace, provider)
            .context("failed to initialize services")?,
    );

    // Schema migrations run before any request is served
    let migration_ctx = MigrationContext {
        collection: &ctx.collection,
        data_dir: &data_dir,
    };
    let report = run_migrations(&migration_ctx, false).context("migrations failed")?;
    info!(
        status = report["status"].as_str().unwrap_or("unknown"),
        version = report["current_version"].as_u64().unwrap_or(0),
        "schema check complete"
    );

    let worker = ctx.capture.spawn_worker();

    let server = McpServer::new(Arc::clone(&ctx));
    StdioTransport::new()
        .run(server)
        .await
        .context("transport loop failed")?;

    info!("stdin closed, shutting down");
    worker.stop();
    Ok(())
}
