//! Collaborator interfaces the core consumes but does not implement.
//!
//! Encryption, HTTP fetching, and filesystem-root resolution are out of
//! scope for the cache itself — these traits exist so an application can
//! plug a concrete implementation in without the cache crate taking on
//! those dependencies itself.

use crate::Result;
use async_trait::async_trait;

/// Encrypts/decrypts payloads before they reach durable storage. Encryption
/// itself is out of scope here; this is the seam a caller wires one in at.
#[async_trait]
pub trait EncryptionProvider: Send + Sync + 'static {
    async fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>>;
    async fn decrypt(&self, ciphertext: &[u8]) -> Result<Vec<u8>>;
}

/// Performs the actual network fetch for `get_or_fetch_object`-style
/// callers. The cache never makes HTTP calls itself.
#[async_trait]
pub trait HttpService: Send + Sync + 'static {
    async fn fetch(&self, url: &str) -> Result<Vec<u8>>;
}

/// Resolves the on-disk root for a named namespace (local-machine,
/// user-account, roaming, secure, ...). Bootstrapping/packaging concerns —
/// which directory layout an application uses — are out of scope here.
pub trait FilesystemProvider: Send + Sync + 'static {
    fn resolve(&self, namespace: &str) -> Result<std::path::PathBuf>;
}
