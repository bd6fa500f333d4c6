//! Credential storage and token acquisition.
//!
//! Provides:
//! - `TokenProvider` - cached, single-flight bearer token acquisition
//! - `InteractiveFlow` - authorization-code fallback through a consent UI
//! - `BackendClient` - the trusted backend (credential broker + config)
//! - Store implementations (memory, file)

pub mod backend;
pub mod error;
pub mod interactive;
pub mod provider;
pub mod store;

pub use backend::BackendClient;
pub use error::AuthError;
pub use interactive::InteractiveFlow;
pub use provider::TokenProvider;
