//! Secret types for protecting sensitive values from accidental logging.
//!
//! Re-exports types from the [`secrecy`] crate. Use these for the TURN REST
//! secret and any other credential material: `Debug` output is redacted, so a
//! struct that derives `Debug` around a secret cannot leak it via `{:?}` or
//! tracing, and the value is zeroized on drop.
//!
//! To read the actual value you must explicitly call
//! [`ExposeSecret::expose_secret`].

pub use secrecy::{ExposeSecret, SecretBox, SecretString};
