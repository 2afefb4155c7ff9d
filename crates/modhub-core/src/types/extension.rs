//! Extension records as read from the metadata store.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// The two kinds of installable extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtensionKind {
    /// A functional module.
    Module,
    /// A presentation-layer theme.
    Theme,
}

impl ExtensionKind {
    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Module => "module",
            Self::Theme => "theme",
        }
    }
}

impl fmt::Display for ExtensionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ExtensionKind {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "module" => Ok(Self::Module),
            "theme" => Ok(Self::Theme),
            other => Err(AppError::validation(format!(
                "Unknown extension type: '{other}'"
            ))),
        }
    }
}

/// Declared info block of an extension (its manifest contents).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionInfo {
    /// Human-readable name.
    #[serde(default)]
    pub label: String,
    /// Short description.
    #[serde(default)]
    pub description: String,
    /// Extension version string.
    #[serde(default)]
    pub version: Option<String>,
    /// Core compatibility constraint (e.g. `7.x`).
    #[serde(default)]
    pub core: Option<String>,
    /// Raw dependency declarations, e.g. `"views (>=7.x-3.0)"`.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Base theme this theme inherits from.
    #[serde(default)]
    pub base_theme: Option<String>,
    /// Template engine used by a theme.
    #[serde(default)]
    pub engine: Option<String>,
    /// Hidden from administrative listings.
    #[serde(default)]
    pub hidden: bool,
    /// Cannot be disabled.
    #[serde(default)]
    pub required: bool,
}

/// One installed extension.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtensionRecord {
    /// Unique machine name.
    pub name: String,
    /// Module or theme.
    pub kind: ExtensionKind,
    /// Whether the extension is enabled.
    pub enabled: bool,
    /// Location of the extension's main file.
    pub filepath: String,
    /// Administrative ordering weight (lower runs first).
    #[serde(default)]
    pub weight: i32,
    /// Declared info block.
    #[serde(default)]
    pub info: ExtensionInfo,
}

impl ExtensionRecord {
    /// Creates an enabled record with an empty info block.
    pub fn new(kind: ExtensionKind, name: impl Into<String>, filepath: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            enabled: true,
            filepath: filepath.into(),
            weight: 0,
            info: ExtensionInfo::default(),
        }
    }

    /// Sets the administrative weight.
    pub fn with_weight(mut self, weight: i32) -> Self {
        self.weight = weight;
        self
    }

    /// Adds raw dependency declarations.
    pub fn with_dependencies<I, S>(mut self, dependencies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.info
            .dependencies
            .extend(dependencies.into_iter().map(Into::into));
        self
    }

    /// Sets the base theme.
    pub fn with_base_theme(mut self, base_theme: impl Into<String>) -> Self {
        self.info.base_theme = Some(base_theme.into());
        self
    }

    /// Sets the theme engine.
    pub fn with_engine(mut self, engine: impl Into<String>) -> Self {
        self.info.engine = Some(engine.into());
        self
    }

    /// Marks the record disabled.
    pub fn disabled(mut self) -> Self {
        self.enabled = false;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parse() {
        assert_eq!("module".parse::<ExtensionKind>().unwrap(), ExtensionKind::Module);
        assert_eq!("theme".parse::<ExtensionKind>().unwrap(), ExtensionKind::Theme);
        assert!("engine".parse::<ExtensionKind>().is_err());
    }

    #[test]
    fn test_info_defaults_from_sparse_json() {
        let record: ExtensionRecord = serde_json::from_str(
            r#"{"name":"node","kind":"module","enabled":true,"filepath":"modules/node/node.module"}"#,
        )
        .unwrap();
        assert_eq!(record.weight, 0);
        assert!(record.info.dependencies.is_empty());
        assert!(record.info.base_theme.is_none());
    }
}
