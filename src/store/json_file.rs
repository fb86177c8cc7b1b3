//! JSON-file quota backend.
//!
//! Persists all scope records in a single JSON document, by default
//! `~/.recipegate/quota/usage.json`. Commits write the whole map to a
//! temporary file and rename it into place, so a crash mid-write never
//! leaves a truncated document behind. Cross-scope write ordering is
//! serialized by an internal lock; the per-scope admission cycle is
//! already serialized above this layer by [`super::QuotaStore::lock_scope`].

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{QuotaBackend, QuotaRecord};
use crate::error::{GateError, Result};

/// File-backed store keyed by scope id.
pub struct JsonFileBackend {
    path: PathBuf,
    // Serializes read-modify-write of the shared document across scopes.
    write_lock: Mutex<()>,
}

impl JsonFileBackend {
    /// Backend rooted at an explicit file path.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Backend at the canonical location, `~/.recipegate/quota/usage.json`.
    pub fn at_default_path() -> Self {
        let base = dirs::home_dir().unwrap_or_else(|| PathBuf::from("."));
        Self::new(base.join(".recipegate").join("quota").join("usage.json"))
    }

    fn read_map(&self) -> Result<HashMap<String, QuotaRecord>> {
        match std::fs::read_to_string(&self.path) {
            Ok(data) => Ok(serde_json::from_str(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(HashMap::new()),
            Err(e) => Err(GateError::Persistence(format!(
                "read {}: {e}",
                self.path.display()
            ))),
        }
    }

    fn write_map(&self, map: &HashMap<String, QuotaRecord>) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                GateError::Persistence(format!("create dir {}: {e}", parent.display()))
            })?;
        }
        let json = serde_json::to_string_pretty(map)?;
        let tmp = tmp_path(&self.path);
        std::fs::write(&tmp, json)
            .map_err(|e| GateError::Persistence(format!("write {}: {e}", tmp.display())))?;
        std::fs::rename(&tmp, &self.path)
            .map_err(|e| GateError::Persistence(format!("rename {}: {e}", self.path.display())))
    }
}

fn tmp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(".tmp");
    path.with_file_name(name)
}

#[async_trait]
impl QuotaBackend for JsonFileBackend {
    async fn load(&self, scope_id: &str) -> Result<Option<QuotaRecord>> {
        let _guard = self.write_lock.lock().expect("file backend lock poisoned");
        Ok(self.read_map()?.remove(scope_id))
    }

    async fn commit(&self, record: &QuotaRecord) -> Result<()> {
        let _guard = self.write_lock.lock().expect("file backend lock poisoned");
        let mut map = self.read_map()?;
        map.insert(record.scope_id.clone(), record.clone());
        self.write_map(&map)
    }
}

impl std::fmt::Debug for JsonFileBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JsonFileBackend")
            .field("path", &self.path)
            .finish()
    }
}
