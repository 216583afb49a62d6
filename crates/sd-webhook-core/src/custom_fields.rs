//! Process-wide custom field ID cache.
//!
//! Custom field IDs are instance specific, so handlers and the request type
//! resolver refer to fields by name. The first lookup of a name queries the
//! platform; every later lookup is served from memory. Found IDs are written
//! through to a JSON file so a restarted process starts warm.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::service_desk::ServiceDeskError;

/// Remote source of custom field IDs.
#[async_trait]
pub trait CustomFieldSource: Send + Sync {
    /// Look up the ID of the custom field called `name` on the site at
    /// `root_url`. `Ok(None)` means the field does not exist.
    async fn lookup_custom_field_id(
        &self,
        root_url: &str,
        name: &str,
    ) -> Result<Option<String>, ServiceDeskError>;
}

/// Read-through cache of custom field name to ID mappings.
///
/// Entries are only ever added; the cache is never reset while the process
/// runs.
pub struct CustomFieldCache {
    path: Option<PathBuf>,
    entries: RwLock<HashMap<String, String>>,
    source: Arc<dyn CustomFieldSource>,
}

impl CustomFieldCache {
    /// Create a cache backed by the JSON file at `path`.
    ///
    /// A missing file starts an empty cache. An unreadable or invalid file
    /// is logged and also starts an empty cache; it is overwritten on the
    /// next successful lookup.
    pub async fn open(path: impl Into<PathBuf>, source: Arc<dyn CustomFieldSource>) -> Self {
        let path = path.into();
        let entries = load_entries(&path).await;
        info!(
            path = %path.display(),
            entries = entries.len(),
            "Loaded custom field cache"
        );

        Self {
            path: Some(path),
            entries: RwLock::new(entries),
            source,
        }
    }

    /// Create a cache that is never written to disk.
    pub fn in_memory(source: Arc<dyn CustomFieldSource>) -> Self {
        Self {
            path: None,
            entries: RwLock::new(HashMap::new()),
            source,
        }
    }

    /// Resolve a custom field name to its ID.
    ///
    /// Returns `None` when the field does not exist or the remote lookup
    /// fails; neither case is cached.
    pub async fn get(&self, root_url: &str, name: &str) -> Option<String> {
        if let Some(id) = self.entries.read().await.get(name) {
            return Some(id.clone());
        }

        match self.source.lookup_custom_field_id(root_url, name).await {
            Ok(Some(id)) => {
                let mut entries = self.entries.write().await;
                entries.insert(name.to_string(), id.clone());
                self.persist(&entries).await;
                debug!(field = %name, id = %id, "Cached custom field ID");
                Some(id)
            }
            Ok(None) => {
                warn!(field = %name, "Custom field not found");
                None
            }
            Err(e) => {
                warn!(field = %name, error = %e, "Custom field lookup failed");
                None
            }
        }
    }

    /// Copy of the current mappings.
    pub async fn snapshot(&self) -> HashMap<String, String> {
        self.entries.read().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn persist(&self, entries: &HashMap<String, String>) {
        let Some(path) = &self.path else {
            return;
        };

        if let Err(e) = write_entries(path, entries).await {
            warn!(
                path = %path.display(),
                error = %e,
                "Failed to persist custom field cache"
            );
        }
    }
}

async fn load_entries(path: &Path) -> HashMap<String, String> {
    let content = match fs::read_to_string(path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Cannot read custom field cache");
            return HashMap::new();
        }
    };

    serde_json::from_str(&content).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "Ignoring invalid custom field cache");
        HashMap::new()
    })
}

async fn write_entries(path: &Path, entries: &HashMap<String, String>) -> std::io::Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).await?;
    }
    let json = serde_json::to_vec_pretty(entries)?;
    fs::write(path, json).await
}

#[cfg(test)]
#[path = "custom_fields_tests.rs"]
mod tests;
