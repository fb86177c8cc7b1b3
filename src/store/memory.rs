//! In-memory quota backend.
//!
//! Used by tests and by embedders that do not need counters to survive a
//! restart. Same contract as the file backend, minus durability.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{QuotaBackend, QuotaRecord};
use crate::error::Result;

/// Volatile `HashMap`-backed store.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    records: Mutex<HashMap<String, QuotaRecord>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuotaBackend for MemoryBackend {
    async fn load(&self, scope_id: &str) -> Result<Option<QuotaRecord>> {
        let guard = self.records.lock().expect("memory backend lock poisoned");
        Ok(guard.get(scope_id).cloned())
    }

    async fn commit(&self, record: &QuotaRecord) -> Result<()> {
        let mut guard = self.records.lock().expect("memory backend lock poisoned");
        guard.insert(record.scope_id.clone(), record.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn test_load_missing_is_none() {
        let backend = MemoryBackend::new();
        assert!(backend.load("ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_commit_overwrites() {
        let backend = MemoryBackend::new();
        let now = Utc::now();
        let mut rec = QuotaRecord::fresh("global", now);
        backend.commit(&rec).await.unwrap();

        rec.minute_hits = 2;
        backend.commit(&rec).await.unwrap();

        let loaded = backend.load("global").await.unwrap().unwrap();
        assert_eq!(loaded.minute_hits, 2);
    }
}
