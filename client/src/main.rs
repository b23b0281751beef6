use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use dirlist_client::{ClientConfig, DirectoryClient};
use dirlist_common::Directory;
use tracing::warn;

#[derive(Parser)]
#[clap(about = "Fetch, build or load directory listings")]
struct Opts {
    /// Server address (host:port)
    #[clap(short, long, default_value = "localhost:9999")]
    server: String,

    /// Seconds to wait for each server message before giving up
    #[clap(long)]
    timeout: Option<u64>,

    /// How to print the listing
    #[clap(short, long, value_enum, default_value_t = Format::Long)]
    format: Format,

    /// Log every message exchanged
    #[clap(short, long)]
    verbose: bool,

    #[clap(subcommand)]
    command: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Ask the server for a listing of one of its directories
    Fetch { path: String },
    /// List a directory on this machine
    Local {
        #[clap(default_value = ".")]
        path: PathBuf,
    },
    /// Load a listing saved as .xml or .json
    Load { file: PathBuf },
}

#[derive(Copy, Clone, PartialEq, Eq, ValueEnum)]
enum Format {
    Short,
    Long,
    Json,
    Xml,
}

#[tokio::main]
async fn main() -> Result<()> {
    let opts = Opts::parse();
    tracing_subscriber::fmt()
        .with_max_level(if opts.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::WARN
        })
        .init();

    let directory = match opts.command {
        Action::Fetch { path } => {
            let client = DirectoryClient::new(ClientConfig {
                server: opts.server,
                timeout: opts.timeout.map(Duration::from_secs),
            });
            client
                .get_directory(&path)
                .await
                .with_context(|| format!("Failed to fetch listing of {path}"))?
        }
        Action::Local { path } => Directory::from_filesystem(&path)
            .await
            .with_context(|| format!("Failed to list {}", path.display()))?,
        Action::Load { file } => load(&file).await?,
    };

    let rendered = match opts.format {
        Format::Short => directory.short_listing(),
        Format::Long => directory.long_listing(),
        Format::Json => format!("{}\n", directory.to_json()),
        Format::Xml => directory.to_xml(),
    };
    print!("{rendered}");
    Ok(())
}

async fn load(file: &Path) -> Result<Directory> {
    let text = tokio::fs::read_to_string(file)
        .await
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let is_xml = file
        .extension()
        .map(|ext| ext.eq_ignore_ascii_case("xml"))
        .unwrap_or_else(|| text.trim_start().starts_with('<'));

    if is_xml {
        let (directory, skipped) = Directory::from_xml_with_report(&text)
            .with_context(|| format!("Failed to parse {}", file.display()))?;
        if skipped > 0 {
            warn!("Skipped {} malformed entries in {}", skipped, file.display());
        }
        Ok(directory)
    } else {
        Directory::from_json(&text).with_context(|| format!("Failed to parse {}", file.display()))
    }
}
