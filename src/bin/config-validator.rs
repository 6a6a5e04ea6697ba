//! # TierCache Configuration Validator
//!
//! Command-line tool for validating cache engine configuration before a
//! service starts. Loads the same sources the engine does, runs every
//! validation rule and can optionally probe the configured remote backend.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::process;
use tiercache_core::config::{CacheEngineConfig, ConfigLoader};
use tiercache_core::policy::PolicyTable;
use tiercache_core::remote::{RemoteCacheProvider, RemoteCacheService};
use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser)]
#[command(name = "config-validator")]
#[command(about = "Validate TierCache configuration files")]
#[command(version = env!("CARGO_PKG_VERSION"))]
pub struct Cli {
    /// Environment whose overlay file is applied (development, test, production)
    #[arg(short, long, env = "TIERCACHE_ENV", default_value = "development")]
    environment: String,

    /// Configuration directory holding tiercache.toml and its overlays
    #[arg(short, long, default_value = "config")]
    config_dir: PathBuf,

    /// Validate a single file instead of a directory
    #[arg(short, long, conflicts_with = "config_dir")]
    file: Option<PathBuf>,

    /// Verbose output level (use multiple times for more verbosity)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Validate every configuration section
    All,

    /// Print the namespace policy table
    Namespaces,

    /// Print the effective configuration as JSON
    Show,

    /// Connect to the configured remote backend and ping it
    Probe,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    let _subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .try_init();

    let result = match &cli.command {
        Some(Commands::All) | None => validate_all(&cli),
        Some(Commands::Namespaces) => list_namespaces(&cli),
        Some(Commands::Show) => show_config(&cli),
        Some(Commands::Probe) => probe_remote(&cli).await,
    };

    match result {
        Ok(()) => {
            info!("Configuration validation completed successfully");
            process::exit(0);
        }
        Err(e) => {
            error!("Configuration validation failed: {:#}", e);
            eprintln!("❌ {:#}", e);
            process::exit(1);
        }
    }
}

fn load(cli: &Cli) -> Result<CacheEngineConfig> {
    match &cli.file {
        Some(path) => ConfigLoader::load_file(path)
            .with_context(|| format!("loading {}", path.display())),
        None => ConfigLoader::load_from_directory_with_env(&cli.config_dir, &cli.environment)
            .with_context(|| describe_directory(&cli.config_dir, &cli.environment)),
    }
}

fn describe_directory(dir: &Path, environment: &str) -> String {
    format!(
        "loading {} for environment '{}'",
        dir.display(),
        environment
    )
}

fn validate_all(cli: &Cli) -> Result<()> {
    println!("🔧 Validating TierCache Configuration");
    println!("Environment: {}", cli.environment);
    match &cli.file {
        Some(path) => println!("Config File: {}", path.display()),
        None => println!("Config Directory: {}", cli.config_dir.display()),
    }
    println!();

    // loading already runs CacheEngineConfig::validate
    let config = load(cli)?;
    println!("✅ Configuration loaded and validated");

    let policies = PolicyTable::from_config(&config.namespaces)?;
    println!(
        "   ✅ {} namespaces, total local capacity {}",
        policies.len(),
        policies.total_local_capacity()
    );
    println!(
        "   ✅ Circuit breaker: threshold {}, cooldown {}s",
        config.circuit_breaker.failure_threshold, config.circuit_breaker.cooldown_seconds
    );
    println!(
        "   ✅ Remote backend: {} (timeout {}ms)",
        config.remote.backend, config.remote.operation_timeout_ms
    );
    println!(
        "   ✅ Maintenance: every {}s, sweep budget {}",
        config.maintenance.interval_seconds, config.maintenance.sweep_budget
    );

    println!("\n🎉 All configuration validation checks passed!");
    Ok(())
}

fn list_namespaces(cli: &Cli) -> Result<()> {
    let config = load(cli)?;
    let policies = PolicyTable::from_config(&config.namespaces)?;

    println!("📋 Namespace Policies:");
    println!(
        "  {:<20} {:>10} {:>12} {:>12}",
        "namespace", "capacity", "local_ttl", "remote_ttl"
    );
    for policy in policies.namespaces() {
        println!(
            "  {:<20} {:>10} {:>11}s {:>11}s",
            policy.namespace,
            policy.max_local_entries,
            policy.local_ttl.as_secs(),
            policy.remote_ttl.as_secs()
        );
    }
    Ok(())
}

fn show_config(cli: &Cli) -> Result<()> {
    let config = load(cli)?;
    let json = serde_json::to_string_pretty(&config).context("serializing configuration")?;
    println!("{json}");
    Ok(())
}

async fn probe_remote(cli: &Cli) -> Result<()> {
    let config = load(cli)?;
    println!("🔌 Probing remote backend '{}'", config.remote.backend);

    let provider = RemoteCacheProvider::from_config_graceful(&config.remote).await;
    if !provider.is_enabled() {
        bail!(
            "remote backend '{}' is unavailable, the engine would run without L2",
            config.remote.backend
        );
    }

    let healthy = tokio::time::timeout(config.remote.operation_timeout(), provider.health_check())
        .await
        .context("health check timed out")??;
    if !healthy {
        bail!("remote backend '{}' reported unhealthy", provider.provider_name());
    }

    println!("   ✅ {} responded", provider.provider_name());
    Ok(())
}
