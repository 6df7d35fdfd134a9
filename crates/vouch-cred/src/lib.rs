//! Vouch credential engine, holder side.
//!
//! Builds blinded credential requests and materializes issuer output into
//! verified, stored credentials.

pub mod error;
pub mod materialize;
pub mod request;
pub mod types;

#[cfg(any(test, feature = "test-utils"))]
pub mod issuer;

pub use error::{CredError, CredResult};
pub use materialize::store_credential;
pub use request::{create_credential_request, verify_credential_request};
pub use types::*;
