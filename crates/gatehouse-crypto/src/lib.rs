//! # gatehouse-crypto: Credential signing primitives
//!
//! Everything cryptographic about a gate credential lives here:
//!
//! - [`CredentialSecret`]: the process-wide signing secret, zeroized on drop
//!   and redacted in debug output
//! - [`sign_credential`]: the deterministic signer
//! - [`generate_nonce`]: 128-bit CSPRNG nonce, URL-safe encoding
//! - [`signatures_match`] / [`verify_presented_signature`]: constant-time
//!   comparison of signatures
//!
//! The signer is a pure function: identical inputs always produce the
//! identical signature, and it has no error conditions. Malformed inputs are
//! a caller contract violation, not a runtime failure.

mod nonce;
mod secret;
mod signing;

pub use nonce::{NONCE_ENTROPY_BYTES, generate_nonce};
pub use secret::CredentialSecret;
pub use signing::{sign_credential, signatures_match, verify_presented_signature};
