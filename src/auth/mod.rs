//! Auth Module
//!
//! Short-lived bearer token management for outbound calls.

mod acquirer;
mod token;

pub use acquirer::{AcquiredToken, ClientAuthStyle, OAuth2Acquirer, TokenAcquirer, DEFAULT_EXPIRES_IN};
pub use token::{CredentialIdentity, TokenCache, TokenState};
