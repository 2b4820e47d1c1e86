//! ferrite CLI entrypoint.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use ferrite_core::config::ProxyConfig;
use ferrite_core::ObjectKey;
use tracing::info;

#[derive(Parser)]
#[command(name = "ferrite")]
#[command(author, version, about = "Caching proxy for a remote object store", long_about = None)]
struct Cli {
    /// Path to a YAML configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the proxy server.
    Serve {
        /// Override the listen address from the configuration.
        #[arg(long)]
        listen: Option<String>,
    },
    /// Fetch one object into the local cache and print its path.
    Fetch {
        /// Bucket name.
        bucket: String,
        /// Object name.
        file: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => ProxyConfig::from_file(path)?,
        None => ProxyConfig::default(),
    };

    match cli.command {
        Commands::Serve { listen } => {
            let mut config = config;
            if let Some(listen) = listen {
                config.server.listen_addr = listen;
            }
            info!(endpoint = %config.remote.endpoint, "starting ferrite proxy");
            ferrite_server::run(config).await?;
        }
        Commands::Fetch { bucket, file } => {
            let state = ferrite_server::build_state(&config)?;
            let key = ObjectKey::new(bucket, file)?;
            let (path, size) = state.cache.get_or_fetch(&key).await?;
            println!("File cached at: {} ({size} bytes)", path.display());
        }
    }

    Ok(())
}
