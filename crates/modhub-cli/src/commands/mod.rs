//! CLI command definitions and dispatch.

pub mod config;
pub mod invalidate;
pub mod list;
pub mod order;
pub mod rebuild;

use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::output::OutputFormat;
use modhub_cache::CacheTiers;
use modhub_core::config::AppConfig;
use modhub_core::error::AppError;
use modhub_extension::ExtensionManager;
use modhub_extension::store::ManifestStore;

/// ModHub — extension registry and hook dispatch
#[derive(Debug, Parser)]
#[command(name = "modhub", version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/default.toml")]
    pub config: String,

    /// Output format
    #[arg(short, long, value_enum, default_value = "table")]
    pub format: OutputFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Show one of the resolved extension lists
    List(list::ListArgs),
    /// Show the dependency order of every manifest
    Order(order::OrderArgs),
    /// Invalidate the cached lists and show what the manifests now resolve to
    Rebuild,
    /// Drop every cached list and hook index
    Invalidate,
    /// Configuration management
    Config(config::ConfigArgs),
}

impl Cli {
    /// Execute the CLI command
    pub async fn execute(&self, config: AppConfig) -> Result<(), AppError> {
        match &self.command {
            Commands::List(args) => list::execute(args, &config, self.format).await,
            Commands::Order(args) => order::execute(args, &config, self.format).await,
            Commands::Rebuild => rebuild::execute(&config, self.format).await,
            Commands::Invalidate => invalidate::execute(&config).await,
            Commands::Config(args) => config::execute(args, &self.config, &config, self.format),
        }
    }
}

/// Helper: manifest store over the configured directory
pub fn manifest_store(config: &AppConfig) -> ManifestStore {
    ManifestStore::new(&config.registry.manifest_directory)
}

/// Helper: extension manager over the manifests and the configured cache.
///
/// The CLI registers no hook providers, so its manager never writes the
/// shared tiers.
pub async fn create_manager(config: &AppConfig) -> Result<ExtensionManager, AppError> {
    let tiers = CacheTiers::connect(&config.cache).await?;
    Ok(ExtensionManager::read_only(
        Arc::new(manifest_store(config)),
        tiers,
        config.registry.clone(),
    ))
}
