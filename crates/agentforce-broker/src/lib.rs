//! Trusted backend for the chat widget.
//!
//! Holds the OAuth client secret and performs token requests against the
//! identity provider on the widget's behalf. Also serves the widget
//! configuration.

pub mod error;
pub mod idp;
pub mod server;
pub mod settings;

pub use error::BrokerServerError;
pub use idp::IdentityProvider;
pub use server::{AppState, router};
pub use settings::BrokerSettings;
