//! Non-fatal problems found while rebuilding or indexing.

use std::fmt;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::warn;

/// A data-quality problem that was recovered locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExtensionDiagnostic {
    /// A theme's base-theme chain could not be resolved; the theme was
    /// left out of the extension list.
    MissingBaseTheme {
        /// The theme that was excluded.
        theme: String,
        /// The ancestor that is missing or loops.
        base_theme: String,
    },
    /// An indexed hook implementation no longer exists and was pruned.
    StaleImplementation {
        /// Hook name.
        hook: String,
        /// Extension that stopped implementing it.
        extension: String,
    },
}

impl fmt::Display for ExtensionDiagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingBaseTheme { theme, base_theme } => write!(
                f,
                "theme '{theme}' skipped: base theme '{base_theme}' is missing or circular"
            ),
            Self::StaleImplementation { hook, extension } => write!(
                f,
                "extension '{extension}' no longer implements hook '{hook}'"
            ),
        }
    }
}

/// Shared collector of diagnostics raised since the last reset.
#[derive(Debug, Default)]
pub struct DiagnosticLog {
    entries: RwLock<Vec<ExtensionDiagnostic>>,
}

impl DiagnosticLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Logs and keeps a diagnostic. Repeats of a kept diagnostic are dropped.
    pub async fn record(&self, diagnostic: ExtensionDiagnostic) {
        let mut entries = self.entries.write().await;
        if entries.contains(&diagnostic) {
            return;
        }
        warn!(diagnostic = %diagnostic, "Extension diagnostic");
        entries.push(diagnostic);
    }

    /// Diagnostics in the order they were raised.
    pub async fn entries(&self) -> Vec<ExtensionDiagnostic> {
        self.entries.read().await.clone()
    }

    /// Drops every kept diagnostic.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}
