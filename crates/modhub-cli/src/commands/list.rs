//! Extension list CLI commands.

use clap::{Args, ValueEnum};
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use modhub_core::config::AppConfig;
use modhub_core::error::AppError;
use modhub_core::types::extension::ExtensionKind;
use modhub_extension::ListKind;

/// Which list to show
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ListChoice {
    /// Modules implementing a bootstrap hook
    Bootstrap,
    /// All enabled modules
    Modules,
    /// Enabled themes
    Themes,
}

/// Arguments for the list command
#[derive(Debug, Args)]
pub struct ListArgs {
    /// List to show
    #[arg(value_enum, default_value = "modules")]
    pub list: ListChoice,
}

/// One module row
#[derive(Debug, Serialize, Tabled)]
pub struct ModuleRow {
    /// Position in call order
    #[tabled(rename = "#")]
    pub position: usize,
    /// Module name
    #[tabled(rename = "Name")]
    pub name: String,
    /// Main file
    #[tabled(rename = "File")]
    pub filepath: String,
}

/// One theme row
#[derive(Debug, Serialize, Tabled)]
pub struct ThemeRow {
    /// Theme name
    #[tabled(rename = "Name")]
    pub name: String,
    /// Effective engine
    #[tabled(rename = "Engine")]
    pub engine: String,
    /// Ancestors, root first
    #[tabled(rename = "Base themes")]
    pub base_themes: String,
    /// Descendants
    #[tabled(rename = "Sub-themes")]
    pub sub_themes: String,
}

/// Execute the list command
pub async fn execute(
    args: &ListArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let manager = super::create_manager(config).await?;
    let registry = manager.registry();

    match args.list {
        ListChoice::Bootstrap | ListChoice::Modules => {
            let kind = if args.list == ListChoice::Bootstrap {
                ListKind::Bootstrap
            } else {
                ListKind::ModuleEnabled
            };
            let mut rows = Vec::new();
            for (position, name) in registry.resolve_list(kind, None).await?.into_iter().enumerate() {
                let filepath = registry
                    .get_filename(ExtensionKind::Module, &name)
                    .await?
                    .unwrap_or_default();
                rows.push(ModuleRow {
                    position: position + 1,
                    name,
                    filepath,
                });
            }
            output::print_list(&rows, format);
        }
        ListChoice::Themes => {
            let rows: Vec<ThemeRow> = registry
                .themes()
                .await?
                .into_values()
                .map(|theme| ThemeRow {
                    name: theme.name,
                    engine: theme.engine.unwrap_or_else(|| "-".to_string()),
                    base_themes: output::join_or_dash(&theme.base_themes),
                    sub_themes: output::join_or_dash(&theme.sub_themes),
                })
                .collect();
            output::print_list(&rows, format);
        }
    }

    for diagnostic in manager.diagnostics().await {
        output::print_warning(&diagnostic.to_string());
    }
    Ok(())
}
