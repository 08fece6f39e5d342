//! Object storage for uploaded shelf images.
//!
//! The pipeline addresses images by opaque string keys; [`ObjectStore`] is
//! the narrow seam behind which any backend can sit. Two backends ship
//! here: [`MemoryStore`] for tests and single-process development, and
//! [`FsStore`] for a local directory tree. Vendor object-storage SDKs plug
//! in behind the same trait but are intentionally not part of this
//! workspace.

pub mod fs;
pub mod memory;

pub use fs::FsStore;
pub use memory::MemoryStore;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures from an object store backend.
///
/// `NotFound` is permanent for a given key; `Io` and `Unavailable` are
/// transient from the caller's point of view and may be retried.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Invalid object key: {0}")]
    InvalidKey(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl StoreError {
    /// Whether retrying the same operation later could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_) | StoreError::Io(_))
    }
}

// ---------------------------------------------------------------------------
// ObjectStore
// ---------------------------------------------------------------------------

/// Stores and retrieves uploaded images by key.
#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `bytes` under `key`, overwriting any previous object.
    async fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Retrieve the object stored under `key`.
    async fn get(&self, key: &str) -> Result<Vec<u8>, StoreError>;
}
