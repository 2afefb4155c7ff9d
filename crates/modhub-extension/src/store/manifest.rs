//! Metadata store backed by a directory of `*.info.json` manifests.
//!
//! Each manifest describes one extension; its machine name is the file
//! name without the `.info.json` suffix:
//!
//! ```json
//! {
//!   "type": "module",
//!   "enabled": true,
//!   "weight": 0,
//!   "label": "Views",
//!   "dependencies": ["ctools", "system (>=7.x)"]
//! }
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use modhub_core::error::AppError;
use modhub_core::result::AppResult;
use modhub_core::traits::metadata::MetadataStore;
use modhub_core::types::extension::{ExtensionInfo, ExtensionKind, ExtensionRecord};

/// Suffix identifying manifest files.
pub const MANIFEST_SUFFIX: &str = ".info.json";

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(rename = "type", default = "default_kind")]
    kind: ExtensionKind,
    #[serde(default = "default_enabled")]
    enabled: bool,
    #[serde(default)]
    weight: i32,
    /// Main file, relative to the manifest's directory.
    #[serde(default)]
    file: Option<String>,
    #[serde(flatten)]
    info: ExtensionInfo,
}

fn default_kind() -> ExtensionKind {
    ExtensionKind::Module
}

fn default_enabled() -> bool {
    true
}

type RecordIndex = BTreeMap<(ExtensionKind, String), ExtensionRecord>;

/// Reads extension records from manifests under a root directory.
///
/// Listing enabled extensions rescans the directory. Record lookups are
/// answered from the most recent scan, so one rebuild reads each manifest
/// once.
#[derive(Debug, Clone)]
pub struct ManifestStore {
    root: PathBuf,
    scanned: Arc<RwLock<Option<Arc<RecordIndex>>>>,
}

impl ManifestStore {
    /// Creates a store over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            scanned: Arc::new(RwLock::new(None)),
        }
    }

    /// Root directory scanned for manifests.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Every manifest under the root, enabled or not.
    pub async fn records(&self) -> AppResult<Vec<ExtensionRecord>> {
        let mut records = Vec::new();
        let mut pending = vec![self.root.clone()];

        if !tokio::fs::try_exists(&self.root).await? {
            return Err(AppError::metadata(format!(
                "Manifest directory '{}' does not exist",
                self.root.display()
            )));
        }

        while let Some(dir) = pending.pop() {
            let mut entries = tokio::fs::read_dir(&dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    pending.push(path);
                    continue;
                }
                let Some(name) = path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .and_then(|n| n.strip_suffix(MANIFEST_SUFFIX))
                else {
                    continue;
                };
                match Self::read_manifest(&path, name).await {
                    Ok(record) => records.push(record),
                    Err(e) => warn!(path = %path.display(), error = %e, "Skipping unreadable manifest"),
                }
            }
        }

        records.sort_by(|a, b| (a.kind, &a.name).cmp(&(b.kind, &b.name)));
        debug!(root = %self.root.display(), count = records.len(), "Scanned manifests");
        Ok(records)
    }

    async fn read_manifest(path: &Path, name: &str) -> AppResult<ExtensionRecord> {
        let raw = tokio::fs::read_to_string(path).await?;
        let manifest: Manifest = serde_json::from_str(&raw)?;

        let filepath = match (&manifest.file, path.parent()) {
            (Some(file), Some(dir)) => dir.join(file),
            _ => path.to_path_buf(),
        };

        Ok(ExtensionRecord {
            name: name.to_string(),
            kind: manifest.kind,
            enabled: manifest.enabled,
            filepath: filepath.to_string_lossy().into_owned(),
            weight: manifest.weight,
            info: manifest.info,
        })
    }

    async fn rescan(&self) -> AppResult<Arc<RecordIndex>> {
        let index: RecordIndex = self
            .records()
            .await?
            .into_iter()
            .map(|record| ((record.kind, record.name.clone()), record))
            .collect();
        let index = Arc::new(index);
        *self.scanned.write().await = Some(index.clone());
        Ok(index)
    }

    async fn enabled_of(&self, kind: ExtensionKind) -> AppResult<BTreeMap<String, i32>> {
        Ok(self
            .rescan()
            .await?
            .values()
            .filter(|record| record.kind == kind && record.enabled)
            .map(|record| (record.name.clone(), record.weight))
            .collect())
    }
}

#[async_trait]
impl MetadataStore for ManifestStore {
    async fn list_enabled_modules(&self) -> AppResult<BTreeMap<String, i32>> {
        self.enabled_of(ExtensionKind::Module).await
    }

    async fn list_enabled_themes(&self) -> AppResult<BTreeMap<String, i32>> {
        self.enabled_of(ExtensionKind::Theme).await
    }

    async fn get_extension_info(
        &self,
        kind: ExtensionKind,
        name: &str,
    ) -> AppResult<Option<ExtensionRecord>> {
        let cached = self.scanned.read().await.clone();
        let index = match cached {
            Some(index) => index,
            None => self.rescan().await?,
        };
        Ok(index.get(&(kind, name.to_string())).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scratch_dir(tag: &str) -> PathBuf {
        std::env::temp_dir().join(format!("modhub-manifest-{tag}-{}", std::process::id()))
    }

    #[tokio::test]
    async fn test_reads_nested_manifests() {
        let root = scratch_dir("nested");
        let _ = tokio::fs::remove_dir_all(&root).await;
        tokio::fs::create_dir_all(root.join("views")).await.unwrap();
        tokio::fs::write(
            root.join("views/views.info.json"),
            r#"{"label":"Views","dependencies":["ctools"],"weight":10,"file":"views.module"}"#,
        )
        .await
        .unwrap();
        tokio::fs::write(root.join("ctools.info.json"), r#"{"enabled":false}"#)
            .await
            .unwrap();
        tokio::fs::write(
            root.join("bartik.info.json"),
            r#"{"type":"theme","engine":"phptemplate"}"#,
        )
        .await
        .unwrap();
        tokio::fs::write(root.join("README.md"), "not a manifest").await.unwrap();

        let store = ManifestStore::new(&root);
        let modules = store.list_enabled_modules().await.unwrap();
        assert_eq!(modules.keys().collect::<Vec<_>>(), ["views"]);
        assert_eq!(modules["views"], 10);

        let views = store
            .get_extension_info(ExtensionKind::Module, "views")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(views.info.dependencies, vec!["ctools".to_string()]);
        assert!(views.filepath.ends_with("views.module"));

        let themes = store.list_enabled_themes().await.unwrap();
        assert!(themes.contains_key("bartik"));

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_lookups_use_last_listing_scan() {
        let root = scratch_dir("scan-once");
        let _ = tokio::fs::remove_dir_all(&root).await;
        tokio::fs::create_dir_all(&root).await.unwrap();
        tokio::fs::write(root.join("node.info.json"), r#"{"weight":3}"#)
            .await
            .unwrap();

        let store = ManifestStore::new(&root);
        assert!(store.list_enabled_modules().await.unwrap().contains_key("node"));

        tokio::fs::remove_file(root.join("node.info.json")).await.unwrap();
        let node = store
            .get_extension_info(ExtensionKind::Module, "node")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(node.weight, 3);

        assert!(store.list_enabled_modules().await.unwrap().is_empty());
        assert!(store
            .get_extension_info(ExtensionKind::Module, "node")
            .await
            .unwrap()
            .is_none());

        tokio::fs::remove_dir_all(&root).await.unwrap();
    }

    #[tokio::test]
    async fn test_missing_directory_is_metadata_error() {
        let store = ManifestStore::new(scratch_dir("absent"));
        let err = store.list_enabled_modules().await.unwrap_err();
        assert_eq!(err.kind, modhub_core::error::ErrorKind::Metadata);
    }
}
