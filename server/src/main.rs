use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use dirlist_server::{DirectoryServer, ServerConfig};
use tracing::info;

#[derive(Parser)]
#[clap(about = "Serve directory listings over line-delimited JSON")]
struct Opts {
    /// Address to listen on
    #[clap(short, long, default_value = "0.0.0.0:9999")]
    bind: String,

    /// Seconds a client may stay silent before it is disconnected (0 disables)
    #[clap(long, default_value_t = 300)]
    idle_timeout: u64,

    /// Serve a single connection, then exit
    #[clap(long)]
    once: bool,

    /// Log every message exchanged
    #[clap(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_max_level(if opts.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        })
        .init();

    let config = ServerConfig {
        bind: opts.bind,
        idle_timeout: (opts.idle_timeout > 0).then(|| Duration::from_secs(opts.idle_timeout)),
    };
    let server = DirectoryServer::bind(&config)
        .await
        .with_context(|| format!("Failed to listen on {}", config.bind))?;

    if opts.once {
        info!("Serving one connection on {}", server.local_addr()?);
        server.serve_one().await?;
    } else {
        server.run().await?;
    }
    Ok(())
}
