use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use dedup_store::IndexStrategy;

#[derive(Parser)]
#[command(
    name = "dedupd",
    about = "Line-deduplicating resource store over HTTP",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Command {
    /// Start the HTTP server
    Serve(ConfigArgs),
    /// Print the effective configuration as TOML
    Config(ConfigArgs),
    /// Remove staging files and index directories left by a crash
    Sweep(ConfigArgs),
}

/// Configuration sources shared by every command. Flags override the file.
#[derive(Args, Clone, Debug, Default)]
pub struct ConfigArgs {
    /// TOML configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,
    /// Listen address, e.g. 0.0.0.0:8080
    #[arg(long)]
    pub bind: Option<SocketAddr>,
    /// Directory holding published resources
    #[arg(long)]
    pub root: Option<PathBuf>,
    /// Directory holding transient disk-backed indexes
    #[arg(long)]
    pub cache: Option<PathBuf>,
    /// Duplicate index: in-memory or disk-backed
    #[arg(long)]
    pub index: Option<IndexStrategy>,
}
