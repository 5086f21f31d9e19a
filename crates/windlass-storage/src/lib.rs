//! Windlass remote storage
//!
//! This crate defines the blob storage contract every environment is
//! bound to: a flat, named-object store used both for the durable
//! bootstrap record and for distributing agent binaries to provisioned
//! machines.
//!
//! Remote object stores are eventually consistent, so reads go through
//! a configurable bounded [`RetryPolicy`]; [`verify_writable`] probes
//! that a backend's storage is genuinely durable before anything relies
//! on it.

pub mod error;
pub mod memory;
pub mod retry;
pub mod storage;

// Re-exports
pub use error::{Result, StorageError};
pub use memory::MemStorage;
pub use retry::RetryPolicy;
pub use storage::{
    Retrying, Storage, VERIFICATION_CONTENT, VERIFICATION_FILE, verify_writable,
};
