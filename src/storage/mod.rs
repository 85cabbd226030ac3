//! # Persistence Layer
//!
//! Key-value blob storage addressed by `(name, path)`. The PKI components
//! never touch the filesystem directly; they receive a [`SecretStore`] and a
//! [`CertificateStore`] handle at construction and go through the
//! [`BlobStore`] trait, so alternative backends can be swapped in behind the
//! same seam.

mod fs;

use std::sync::Arc;

pub use fs::FileStore;

use crate::errors::Result;

/// Abstract blob store: named values under an optional hierarchical path.
pub trait BlobStore: Send + Sync {
    /// Write a blob, creating intermediate path segments as needed.
    /// Replaces any existing blob of the same name.
    fn write(&self, name: &str, value: &[u8], path: Option<&str>) -> Result<()>;

    /// Read a blob. Fails with `NotFound` if it does not exist.
    fn read(&self, name: &str, path: Option<&str>) -> Result<Vec<u8>>;

    /// Check whether a blob exists.
    fn exists(&self, name: &str, path: Option<&str>) -> bool;

    /// Delete a blob, or a whole subtree if `name` addresses one.
    /// Fails with `NotFound` if the target does not exist.
    fn delete(&self, name: &str, path: Option<&str>) -> Result<()>;

    /// List entry names directly under a path.
    fn list(&self, path: Option<&str>) -> Result<Vec<String>>;
}

fn read_string(store: &dyn BlobStore, name: &str, path: Option<&str>) -> Result<String> {
    let bytes = store.read(name, path)?;
    String::from_utf8(bytes).map_err(|e| {
        crate::errors::Error::internal(format!("stored blob '{}' is not valid UTF-8: {}", name, e))
    })
}

/// Handle to the store holding private keys and parent-CA pointers.
#[derive(Clone)]
pub struct SecretStore {
    inner: Arc<dyn BlobStore>,
}

impl SecretStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self { inner }
    }

    pub fn write(&self, name: &str, value: &[u8], path: Option<&str>) -> Result<()> {
        self.inner.write(name, value, path)
    }

    pub fn read(&self, name: &str, path: Option<&str>) -> Result<Vec<u8>> {
        self.inner.read(name, path)
    }

    pub fn read_string(&self, name: &str, path: Option<&str>) -> Result<String> {
        read_string(self.inner.as_ref(), name, path)
    }

    pub fn exists(&self, name: &str, path: Option<&str>) -> bool {
        self.inner.exists(name, path)
    }

    pub fn delete(&self, name: &str, path: Option<&str>) -> Result<()> {
        self.inner.delete(name, path)
    }

    pub fn list(&self, path: Option<&str>) -> Result<Vec<String>> {
        self.inner.list(path)
    }
}

/// Handle to the store holding certificates, role and client records.
#[derive(Clone)]
pub struct CertificateStore {
    inner: Arc<dyn BlobStore>,
}

impl CertificateStore {
    pub fn new(inner: Arc<dyn BlobStore>) -> Self {
        Self { inner }
    }

    pub fn write(&self, name: &str, value: &[u8], path: Option<&str>) -> Result<()> {
        self.inner.write(name, value, path)
    }

    pub fn read(&self, name: &str, path: Option<&str>) -> Result<Vec<u8>> {
        self.inner.read(name, path)
    }

    pub fn read_string(&self, name: &str, path: Option<&str>) -> Result<String> {
        read_string(self.inner.as_ref(), name, path)
    }

    pub fn exists(&self, name: &str, path: Option<&str>) -> bool {
        self.inner.exists(name, path)
    }

    pub fn delete(&self, name: &str, path: Option<&str>) -> Result<()> {
        self.inner.delete(name, path)
    }

    pub fn list(&self, path: Option<&str>) -> Result<Vec<String>> {
        self.inner.list(path)
    }
}
