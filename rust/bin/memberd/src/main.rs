//! `memberd`: the member account server.
//!
//! Usage:
//!   memberd -c <context-name-or-path> [--listen <addr>]
//!
//! The context name resolves to `/etc/memberd/<name>.toml`.
//! If a path with `/` or `.` is given, it's used directly.

mod config;
mod routes;

use std::sync::Arc;

use clap::Parser;
use memberd_core::{Module, Paginator};
use tracing::info;

use config::ServerConfig;

/// Member account server.
#[derive(Parser, Debug)]
#[command(name = "memberd", about = "Member account server")]
struct Cli {
    /// Context name or path to config file.
    #[arg(short = 'c', long = "config", required = true)]
    config: String,

    /// Listen address (overrides `service.listen`).
    #[arg(long = "listen")]
    listen: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let cli = Cli::parse();

    let config_path = ServerConfig::resolve_path(&cli.config);
    info!("Loading configuration from {}", config_path.display());
    let mut server_config = ServerConfig::load(&config_path)?;
    server_config.verify()?;
    if let Some(listen) = cli.listen {
        server_config.service.listen = listen;
    }
    let service = &server_config.service;

    // Storage: one read and one write connection to the same file.
    if let Some(dir) = &service.data_dir {
        std::fs::create_dir_all(dir)?;
    }
    let sqlite_path = service.resolve_sqlite_path();
    let pool = memberd_sql::DbPool::open_sqlite(&sqlite_path)
        .map_err(|e| anyhow::anyhow!("failed to open SQL store: {}", e))?;
    info!("SQLite database at {}", sqlite_path.display());

    let paginator = Paginator::new(service.pagination)?;

    let member_module = member::MemberModule::new(
        pool,
        &server_config.member,
        paginator,
        Arc::new(member::notify::LogNotifier),
    )?;
    info!("Member module initialized");

    let app = routes::build_router(vec![(member_module.name(), member_module.routes())]);

    let listener = tokio::net::TcpListener::bind(&service.listen).await?;
    info!("memberd listening on {}", service.listen);
    axum::serve(listener, app).await?;

    Ok(())
}
