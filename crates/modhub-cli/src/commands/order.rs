//! Dependency order CLI command.

use std::collections::BTreeMap;

use clap::Args;
use serde::Serialize;
use tabled::Tabled;

use crate::output::{self, OutputFormat};
use modhub_core::config::AppConfig;
use modhub_core::error::AppError;
use modhub_core::types::extension::ExtensionKind;
use modhub_extension::graph::build_dependency_order_from_declarations;

/// Arguments for the order command
#[derive(Debug, Args)]
pub struct OrderArgs {
    /// Include disabled modules
    #[arg(short, long)]
    pub all: bool,
}

/// One node of the dependency order
#[derive(Debug, Serialize, Tabled)]
pub struct OrderRow {
    /// Dependency weight
    #[tabled(rename = "Weight")]
    pub weight: usize,
    /// Module name
    #[tabled(rename = "Name")]
    pub name: String,
    /// Everything it requires, transitively
    #[tabled(rename = "Requires")]
    pub requires: String,
    /// Everything requiring it, transitively
    #[tabled(rename = "Required by")]
    pub required_by: String,
    /// Missing or version-incompatible dependencies
    #[tabled(rename = "Problems")]
    pub problems: String,
}

/// Execute the order command
pub async fn execute(
    args: &OrderArgs,
    config: &AppConfig,
    format: OutputFormat,
) -> Result<(), AppError> {
    let records: Vec<_> = super::manifest_store(config)
        .records()
        .await?
        .into_iter()
        .filter(|r| r.kind == ExtensionKind::Module && (args.all || r.enabled))
        .collect();

    let declarations: BTreeMap<String, Vec<String>> = records
        .iter()
        .map(|r| (r.name.clone(), r.info.dependencies.clone()))
        .collect();
    let versions: BTreeMap<&str, Option<&str>> = records
        .iter()
        .map(|r| (r.name.as_str(), r.info.version.as_deref()))
        .collect();

    let core = &config.registry.core_compatibility;
    let order = build_dependency_order_from_declarations(&declarations, core)?;

    let rows: Vec<OrderRow> = order
        .ordered()
        .into_iter()
        .filter_map(|name| order.get(&name))
        .filter(|node| node.declared)
        .map(|node| {
            let mut problems = Vec::new();
            for spec in &node.edges {
                match versions.get(spec.name.as_str()) {
                    None => problems.push(format!("{} (missing)", spec.name)),
                    Some(Some(version)) if !spec.is_satisfied_by(version, core) => {
                        problems.push(format!(
                            "{} ({}) incompatible with {version}",
                            spec.name,
                            spec.original_version.as_deref().unwrap_or_default()
                        ))
                    }
                    Some(_) => {}
                }
            }
            OrderRow {
                weight: node.weight,
                name: node.name.clone(),
                requires: output::join_or_dash(node.requires.keys()),
                required_by: output::join_or_dash(&node.required_by),
                problems: output::join_or_dash(&problems),
            }
        })
        .collect();

    output::print_list(&rows, format);
    Ok(())
}
