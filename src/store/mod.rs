//! Secure key/value storage for the persisted Garmin session.
//!
//! The session core only needs get/set/delete by key. Two backends:
//! - `EncryptedFileStore`: AES-256-GCM sealed values in a JSON file, written
//!   atomically (temp file + rename).
//! - `MemoryStore`: process-local, for tests and ephemeral deployments.

mod file;
mod memory;

pub use file::EncryptedFileStore;
pub use memory::MemoryStore;

use async_trait::async_trait;

use crate::error::AuthError;

/// Fixed key the serialized token blob lives under.
pub const TOKEN_STORAGE_KEY: &str = "garmin_tokens";

/// A get/set/delete-by-key capability backed by some secure medium.
///
/// A read either sees a complete value or none at all; implementations must
/// never expose a half-written value.
#[async_trait]
pub trait SecretStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, AuthError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), AuthError>;

    /// Remove a key. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<(), AuthError>;
}
