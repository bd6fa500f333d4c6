//! Credential store implementations.

#[cfg(feature = "memory")]
pub mod memory;

#[cfg(feature = "file")]
pub mod file;

#[cfg(feature = "memory")]
pub use memory::MemoryCredentialStore;

#[cfg(feature = "file")]
pub use file::FileCredentialStore;

/// Namespace used when the embedder does not pick one.
pub const DEFAULT_NAMESPACE: &str = "sf";
