//! The cached, derived view of enabled extensions.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use modhub_core::types::extension::{ExtensionInfo, ExtensionKind};

/// Which list [`ExtensionRegistry::resolve_list`](crate::ExtensionRegistry::resolve_list)
/// returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListKind {
    /// Enabled modules implementing a bootstrap-phase hook.
    Bootstrap,
    /// All enabled modules.
    ModuleEnabled,
    /// Enabled themes with a resolvable base-theme chain.
    Theme,
}

impl fmt::Display for ListKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bootstrap => write!(f, "bootstrap"),
            Self::ModuleEnabled => write!(f, "module_enabled"),
            Self::Theme => write!(f, "theme"),
        }
    }
}

/// A name and the location of its main file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListEntry {
    /// Extension name.
    pub name: String,
    /// Location of the extension's main file.
    pub filepath: String,
}

/// One row of the filesystem side table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilepathEntry {
    /// Module or theme.
    pub kind: ExtensionKind,
    /// Extension name.
    pub name: String,
    /// Location of the extension's main file.
    pub filepath: String,
}

/// An enabled theme with its resolved inheritance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ThemeRecord {
    /// Theme name.
    pub name: String,
    /// Location of the theme's main file.
    pub filepath: String,
    /// Administrative weight.
    pub weight: i32,
    /// Declared info block.
    pub info: ExtensionInfo,
    /// Effective engine (inherited from the root base theme if any).
    pub engine: Option<String>,
    /// Ancestor chain, root ancestor first, direct parent last.
    pub base_themes: Vec<String>,
    /// Themes that have this theme somewhere in their ancestor chain.
    pub sub_themes: Vec<String>,
}

/// The full extension list computed by a rebuild.
///
/// Serialized as one blob into the default cache tier. Only ordered
/// collections are used so an unchanged metadata snapshot always
/// serializes to the same bytes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionListSnapshot {
    /// Bootstrap-eligible modules, in module order.
    pub bootstrap: Vec<ListEntry>,
    /// Enabled modules, in module order.
    pub module_enabled: Vec<ListEntry>,
    /// Enabled themes by name.
    pub theme: BTreeMap<String, ThemeRecord>,
    /// Locations of every enabled module and theme.
    pub filepaths: Vec<FilepathEntry>,
}

impl ExtensionListSnapshot {
    /// Names of one list, in order.
    pub fn names(&self, kind: ListKind) -> Vec<String> {
        match kind {
            ListKind::Bootstrap => self.bootstrap.iter().map(|e| e.name.clone()).collect(),
            ListKind::ModuleEnabled => self.module_enabled.iter().map(|e| e.name.clone()).collect(),
            ListKind::Theme => self.theme.keys().cloned().collect(),
        }
    }

    /// Location of an extension's main file.
    pub fn filepath(&self, kind: ExtensionKind, name: &str) -> Option<&str> {
        self.filepaths
            .iter()
            .find(|e| e.kind == kind && e.name == name)
            .map(|e| e.filepath.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(name: &str) -> ListEntry {
        ListEntry {
            name: name.to_string(),
            filepath: format!("modules/{name}/{name}.module"),
        }
    }

    #[test]
    fn test_names_and_filepath_lookup() {
        let snapshot = ExtensionListSnapshot {
            bootstrap: vec![entry("system")],
            module_enabled: vec![entry("system"), entry("node")],
            theme: BTreeMap::new(),
            filepaths: vec![FilepathEntry {
                kind: ExtensionKind::Module,
                name: "node".into(),
                filepath: "modules/node/node.module".into(),
            }],
        };
        assert_eq!(snapshot.names(ListKind::ModuleEnabled), vec!["system", "node"]);
        assert_eq!(snapshot.names(ListKind::Bootstrap), vec!["system"]);
        assert_eq!(
            snapshot.filepath(ExtensionKind::Module, "node"),
            Some("modules/node/node.module")
        );
        assert_eq!(snapshot.filepath(ExtensionKind::Theme, "node"), None);
    }
}
