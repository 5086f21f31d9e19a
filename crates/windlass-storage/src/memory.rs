//! In-memory storage backend

use crate::error::{Result, StorageError};
use crate::storage::Storage;
use async_trait::async_trait;
use std::collections::BTreeMap;
use tokio::sync::Mutex;

#[derive(Default)]
struct Inner {
    objects: BTreeMap<String, Vec<u8>>,
    /// Remaining reads of a freshly written object that still report
    /// NotFound, simulating read-after-write lag.
    pending: BTreeMap<String, u32>,
}

/// In-memory [`Storage`] backend.
///
/// Used by test suites across the workspace and by backends whose
/// "remote" store is process-local. [`MemStorage::with_read_lag`]
/// makes each written object invisible for the first `lag` reads so
/// retry behavior can be exercised.
pub struct MemStorage {
    namespace: String,
    read_lag: u32,
    inner: Mutex<Inner>,
}

impl MemStorage {
    pub fn new(namespace: impl Into<String>) -> Self {
        Self::with_read_lag(namespace, 0)
    }

    pub fn with_read_lag(namespace: impl Into<String>, read_lag: u32) -> Self {
        Self {
            namespace: namespace.into(),
            read_lag,
            inner: Mutex::new(Inner::default()),
        }
    }
}

#[async_trait]
impl Storage for MemStorage {
    async fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        if name.is_empty() {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        let mut inner = self.inner.lock().await;
        inner.objects.insert(name.to_string(), data.to_vec());
        if self.read_lag > 0 {
            inner.pending.insert(name.to_string(), self.read_lag);
        }
        Ok(())
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().await;
        if let Some(remaining) = inner.pending.get_mut(name) {
            if *remaining > 0 {
                *remaining -= 1;
                return Err(StorageError::NotFound(name.to_string()));
            }
        }
        inner
            .objects
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let inner = self.inner.lock().await;
        // BTreeMap iteration is already lexicographic.
        Ok(inner
            .objects
            .keys()
            .filter(|name| name.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn remove(&self, name: &str) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.objects.remove(name);
        inner.pending.remove(name);
        Ok(())
    }

    async fn remove_all(&self) -> Result<()> {
        let mut inner = self.inner.lock().await;
        inner.objects.clear();
        inner.pending.clear();
        Ok(())
    }

    fn url(&self, name: &str) -> Result<String> {
        Ok(format!("mem://{}/{}", self.namespace, name))
    }
}
