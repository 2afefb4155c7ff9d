//! Extension list rebuild CLI command.
//!
//! Serving processes rebuild the cached lists on their next lookup; this
//! command drops the cached copies and previews the result.

use crate::output::{self, OutputFormat};
use modhub_core::config::AppConfig;
use modhub_core::error::AppError;
use modhub_extension::RebuildOutcome;

/// Execute the rebuild command
pub async fn execute(config: &AppConfig, format: OutputFormat) -> Result<(), AppError> {
    let manager = super::create_manager(config).await?;
    manager.invalidate().await?;

    match manager.registry().rebuild().await? {
        RebuildOutcome::Rebuilt(snapshot) => match format {
            OutputFormat::Json => output::print_item(snapshot.as_ref(), format),
            OutputFormat::Table => {
                output::print_success("Cached extension lists invalidated");
                output::print_kv("Modules", &snapshot.module_enabled.len().to_string());
                output::print_kv("Themes", &snapshot.theme.len().to_string());
            }
        },
        RebuildOutcome::InProgress => {
            output::print_warning("A rebuild is already in progress");
        }
    }

    for diagnostic in manager.diagnostics().await {
        output::print_warning(&diagnostic.to_string());
    }
    Ok(())
}
