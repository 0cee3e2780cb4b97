pub use clap::Parser;

use std::path::PathBuf;
use url::Url;

#[derive(Parser, Debug)]
#[command(name = "tunnel")]
#[command(about = "Chat over end-to-end encrypted tunnels")]
pub struct Args {
    /// Broker to talk to (defaults to the configured broker_url)
    #[arg(long, global = true)]
    pub remote: Option<Url>,

    /// Path to the tunnel config directory (defaults to ~/.tunnel)
    #[arg(long, global = true)]
    pub config_path: Option<PathBuf>,

    /// Override the configured log level
    #[arg(long, global = true)]
    pub log_level: Option<tracing::Level>,

    #[command(subcommand)]
    pub command: crate::Command,
}
