//! Common utilities and types shared across Driveloft modules.
//!
//! This module provides the error type, the remote-locator model used as the
//! idempotence guard, and the secret wrapper for stored credentials.

pub mod error;
pub mod locator;
pub mod secret;
pub mod validate;

pub use error::{Error, Result};
pub use locator::RemoteRef;
pub use secret::SecretString;
