//! Configuration management CLI commands.

use clap::{Args, Subcommand};

use crate::output::{self, OutputFormat};
use modhub_core::config::AppConfig;
use modhub_core::error::AppError;

/// Arguments for config commands
#[derive(Debug, Args)]
pub struct ConfigArgs {
    /// Config subcommand
    #[command(subcommand)]
    pub command: ConfigCommand,
}

/// Config subcommands
#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,
    /// Validate the configuration
    Validate,
}

/// Execute config commands
pub fn execute(
    args: &ConfigArgs,
    config_path: &str,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    match &args.command {
        ConfigCommand::Show => output::print_item(config, format),
        ConfigCommand::Validate => {
            validate(config)?;
            output::print_success(&format!("Configuration '{config_path}' is valid"));
            output::print_kv("Cache", &config.cache.provider);
            if config.cache.provider == "redis" {
                output::print_kv("Redis", &mask_password(&config.cache.redis.url));
            }
            output::print_kv("Manifests", &config.registry.manifest_directory);
            output::print_kv("Bootstrap hooks", &config.registry.bootstrap_hooks.join(", "));
            output::print_kv(
                "Default theme",
                config.registry.default_theme.as_deref().unwrap_or("-"),
            );
        }
    }
    Ok(())
}

fn validate(config: &AppConfig) -> Result<(), AppError> {
    if !matches!(config.cache.provider.as_str(), "memory" | "redis") {
        return Err(AppError::configuration(format!(
            "Unknown cache provider '{}'",
            config.cache.provider
        )));
    }
    if config.cache.bootstrap_prefix == config.cache.default_prefix {
        return Err(AppError::configuration(
            "Cache tiers must use different key prefixes",
        ));
    }
    if config.registry.cacheable_methods.is_empty() {
        output::print_warning("No cacheable request methods; the hook index is never persisted");
    }
    Ok(())
}

/// Mask password in a connection URL for display
fn mask_password(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(colon_pos) = url[..at_pos].rfind(':') {
            let scheme_end = url.find("://").map(|i| i + 3).unwrap_or(0);
            if colon_pos > scheme_end {
                let mut masked = url[..colon_pos + 1].to_string();
                masked.push_str("****");
                masked.push_str(&url[at_pos..]);
                return masked;
            }
        }
    }
    url.to_string()
}
