//! Cache invalidation CLI command.

use crate::output;
use modhub_core::config::AppConfig;
use modhub_core::error::AppError;

/// Execute the invalidate command
pub async fn execute(config: &AppConfig) -> Result<(), AppError> {
    let manager = super::create_manager(config).await?;
    manager.invalidate().await?;
    output::print_success("Extension lists and hook index invalidated");
    Ok(())
}
