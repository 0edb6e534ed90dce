use anyhow::Context;
use colored::Colorize;
use dedup_server::{DedupServer, ServerConfig};
use dedup_store::DedupStore;

use crate::cli::{Cli, Command, ConfigArgs};

pub fn run_command(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Command::Serve(args) => cmd_serve(args),
        Command::Config(args) => cmd_config(args),
        Command::Sweep(args) => cmd_sweep(args),
    }
}

/// Load the config file (if any) and apply flag overrides.
pub fn resolve_config(args: &ConfigArgs) -> anyhow::Result<ServerConfig> {
    let mut config = match &args.config {
        Some(path) => ServerConfig::load(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => ServerConfig::default(),
    };
    if let Some(bind) = args.bind {
        config.bind_addr = bind;
    }
    if let Some(root) = &args.root {
        config.store.storage_root = root.clone();
    }
    if let Some(cache) = &args.cache {
        config.store.cache_root = cache.clone();
    }
    if let Some(index) = args.index {
        config.store.index = index;
    }
    Ok(config)
}

fn runtime() -> anyhow::Result<tokio::runtime::Runtime> {
    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("starting tokio runtime")
}

fn cmd_serve(args: ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    println!(
        "{} dedup server on {} (root: {}, index: {})",
        "▶".green().bold(),
        config.bind_addr.to_string().bold(),
        config.store.storage_root.display(),
        config.store.index.to_string().cyan(),
    );
    runtime()?
        .block_on(DedupServer::new(config).serve())
        .context("server failed")
}

fn cmd_config(args: ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    print!("{}", config.to_toml()?);
    Ok(())
}

fn cmd_sweep(args: ConfigArgs) -> anyhow::Result<()> {
    let config = resolve_config(&args)?;
    let store = runtime()?
        .block_on(DedupStore::open(config.store))
        .context("sweeping store")?;
    let report = store.recovered();
    println!(
        "{} Sweep complete: {} index directories, {} staging files removed.",
        "✓".green().bold(),
        report.index_dirs,
        report.staging_files,
    );
    Ok(())
}
