//! The shared credential-signing secret.

use std::fmt::{self, Debug};

use zeroize::{Zeroize, ZeroizeOnDrop};

/// The process-wide secret bound into every credential signature.
///
/// Loaded once at startup from configuration and passed by reference into the
/// signer; never logged and never part of any response. The backing memory is
/// zeroized when the value is dropped.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct CredentialSecret(String);

impl CredentialSecret {
    /// Wraps a secret string.
    ///
    /// Length policy is enforced where the secret is loaded
    /// (`gatehouse-config`), not here.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret bytes for digest computation.
    pub(crate) fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl Debug for CredentialSecret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("CredentialSecret(<redacted>)")
    }
}
