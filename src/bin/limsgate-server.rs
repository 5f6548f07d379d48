// ABOUTME: Limsgate server binary wiring configuration, database, and router
// ABOUTME: Environment-driven with a few command-line overrides
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Limsgate Developers

use anyhow::Result;
use clap::Parser;
use limsgate::{
    config::ServerConfig,
    database::Database,
    logging::{init_logging, LoggingConfig},
    server::{run_server, ServerResources},
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "limsgate-server")]
#[command(about = "Limsgate - tenant-scoped authentication for the lab platform")]
pub struct Args {
    /// Override HTTP port
    #[arg(long)]
    http_port: Option<u16>,

    /// Override database URL
    #[arg(long)]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_logging(&LoggingConfig::from_env())?;

    let mut config = ServerConfig::from_env()?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    if let Some(url) = args.database_url {
        config.database_url = url;
    }

    info!(
        port = config.http_port,
        environment = %config.environment,
        platform_host = %config.platform_host,
        tenant_base_domain = %config.tenant_base_domain,
        "Starting Limsgate"
    );

    let database = Database::new(&config.database_url).await?;
    database.migrate().await?;
    info!("Database ready");

    let resources = Arc::new(ServerResources::new(database, config));
    run_server(resources).await?;

    Ok(())
}
