//! The remote blob storage contract

use crate::error::{Result, StorageError};
use crate::retry::RetryPolicy;
use async_trait::async_trait;

/// Name of the object written by [`verify_writable`].
pub const VERIFICATION_FILE: &str = "bootstrap-verify";

/// Expected content of the verification object.
pub const VERIFICATION_CONTENT: &str = "storage writing verified: ok\n";

/// A named-blob store bound to one environment's namespace.
///
/// This is the sole durable medium for bootstrap state and tools
/// archives. Implementations must tolerate concurrent calls; every
/// method takes `&self`.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Store `data` under `name`, replacing any existing object.
    async fn put(&self, name: &str, data: &[u8]) -> Result<()>;

    /// Fetch the object named `name`.
    ///
    /// Returns [`StorageError::NotFound`] when no such object exists.
    async fn get(&self, name: &str) -> Result<Vec<u8>>;

    /// List object names starting with `prefix`, sorted
    /// lexicographically. An empty result is an empty vec, never an
    /// error.
    async fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Remove the named object. Removing a missing object is not an
    /// error.
    async fn remove(&self, name: &str) -> Result<()>;

    /// Remove every object in the namespace.
    async fn remove_all(&self) -> Result<()>;

    /// Externally fetchable address for `name`, usable by machines that
    /// cannot reach the store through the same path as the caller.
    fn url(&self, name: &str) -> Result<String>;
}

/// Wraps a [`Storage`] so reads honor a [`RetryPolicy`].
///
/// Only `get` and `list` are retried, covering read-after-write lag on
/// remote object stores; writes and removals go straight through.
pub struct Retrying<S> {
    inner: S,
    policy: RetryPolicy,
}

impl<S: Storage> Retrying<S> {
    pub fn new(inner: S, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

#[async_trait]
impl<S: Storage> Storage for Retrying<S> {
    async fn put(&self, name: &str, data: &[u8]) -> Result<()> {
        self.inner.put(name, data).await
    }

    async fn get(&self, name: &str) -> Result<Vec<u8>> {
        self.policy.run(|| self.inner.get(name)).await
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>> {
        self.policy.run(|| self.inner.list(prefix)).await
    }

    async fn remove(&self, name: &str) -> Result<()> {
        self.inner.remove(name).await
    }

    async fn remove_all(&self) -> Result<()> {
        self.inner.remove_all().await
    }

    fn url(&self, name: &str) -> Result<String> {
        self.inner.url(name)
    }
}

/// Probe that `storage` durably accepts writes.
///
/// Writes a well-known marker object and reads it back. A failed write
/// surfaces the backend error as-is; a read-back failure or content
/// mismatch returns [`StorageError::VerificationFailed`], which tells
/// "cannot write" apart from "wrote, but cannot be trusted".
pub async fn verify_writable(storage: &dyn Storage) -> Result<()> {
    tracing::debug!("verifying that storage is writable");
    storage
        .put(VERIFICATION_FILE, VERIFICATION_CONTENT.as_bytes())
        .await?;
    match storage.get(VERIFICATION_FILE).await {
        Ok(data) if data == VERIFICATION_CONTENT.as_bytes() => Ok(()),
        Ok(_) => Err(StorageError::VerificationFailed(format!(
            "{VERIFICATION_FILE} does not match the content written to it"
        ))),
        Err(err) => Err(StorageError::VerificationFailed(format!(
            "cannot read {VERIFICATION_FILE} back: {err}"
        ))),
    }
}
