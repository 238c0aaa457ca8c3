//! The credential signer and constant-time verification.

use gatehouse_types::Signature;
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

use crate::secret::CredentialSecret;

/// Computes the signature for a credential's canonical fields.
///
/// The digest input is the concatenation
/// `{visitor_id}{unit_id}{valid_until}{nonce}{secret}{nonce}` hashed with
/// SHA-256. Binding the secret prevents forgery without it; binding the nonce
/// (on both sides of the secret) keeps two credentials distinct even when
/// every other field repeats. `valid_until` must be the exact string carried
/// in the credential — verification re-derives over the presented string
/// verbatim.
///
/// Deterministic and stateless: no clock, no randomness, no error conditions.
pub fn sign_credential(
    secret: &CredentialSecret,
    visitor_id: &str,
    unit_id: &str,
    valid_until: &str,
    nonce: &str,
) -> Signature {
    let mut hasher = Sha256::new();
    hasher.update(visitor_id.as_bytes());
    hasher.update(unit_id.as_bytes());
    hasher.update(valid_until.as_bytes());
    hasher.update(nonce.as_bytes());
    hasher.update(secret.as_bytes());
    hasher.update(nonce.as_bytes());
    Signature::from_bytes(hasher.finalize().into())
}

/// Compares two signatures in constant time.
///
/// Required for every check against a presented signature, so response timing
/// cannot leak how many leading bytes of a guess were correct.
pub fn signatures_match(expected: &Signature, presented: &Signature) -> bool {
    expected
        .as_bytes()
        .ct_eq(presented.as_bytes())
        .unwrap_u8()
        == 1
}

/// Verifies a presented hex-encoded signature against the expected one.
///
/// Returns false for anything that is not exactly 64 hex characters; the
/// length/charset check leaks nothing about the digest itself. Well-formed
/// input goes through the constant-time comparison.
pub fn verify_presented_signature(expected: &Signature, presented: &str) -> bool {
    match Signature::from_hex(presented) {
        Some(sig) => signatures_match(expected, &sig),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secret() -> CredentialSecret {
        CredentialSecret::new("unit-test-signing-secret-0123456789abcdef")
    }

    const VISITOR: &str = "0d4e7a9c-8a6a-4f5e-9f0a-1c2b3d4e5f60";
    const UNIT: &str = "77777777-1111-2222-3333-444444444444";
    const VALID_UNTIL: &str = "2026-03-01T12:00:00.000000Z";
    const NONCE: &str = "q3zXo8yTn5vW1bK9cD2eFg";

    #[test]
    fn test_sign_is_deterministic() {
        let a = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);
        let b = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);
        assert_eq!(a, b);
    }

    #[test]
    fn test_each_field_is_bound() {
        let base = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);

        let mutated = [
            sign_credential(&secret(), "other-visitor", UNIT, VALID_UNTIL, NONCE),
            sign_credential(&secret(), VISITOR, "other-unit", VALID_UNTIL, NONCE),
            sign_credential(&secret(), VISITOR, UNIT, "2027-01-01T00:00:00.000000Z", NONCE),
            sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, "other-nonce"),
        ];
        for sig in mutated {
            assert_ne!(base, sig);
        }
    }

    #[test]
    fn test_secret_is_bound() {
        let a = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);
        let other = CredentialSecret::new("a-completely-different-secret-value!!");
        let b = sign_credential(&other, VISITOR, UNIT, VALID_UNTIL, NONCE);
        assert_ne!(a, b);
    }

    #[test]
    fn test_verify_accepts_own_output() {
        let sig = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);
        assert!(verify_presented_signature(&sig, &sig.to_string()));
    }

    #[test]
    fn test_verify_accepts_uppercase_hex() {
        let sig = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);
        assert!(verify_presented_signature(&sig, &sig.to_string().to_uppercase()));
    }

    #[test]
    fn test_verify_rejects_garbage() {
        let sig = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);
        assert!(!verify_presented_signature(&sig, ""));
        assert!(!verify_presented_signature(&sig, "not-hex-at-all"));
        assert!(!verify_presented_signature(&sig, &"00".repeat(31)));
    }

    #[test]
    fn test_verify_rejects_flipped_digit() {
        let sig = sign_credential(&secret(), VISITOR, UNIT, VALID_UNTIL, NONCE);
        let hex = sig.to_string();
        let first = hex.as_bytes()[0];
        let flipped = if first == b'0' { '1' } else { '0' };
        let mut tampered = hex.clone();
        tampered.replace_range(0..1, &flipped.to_string());
        assert!(!verify_presented_signature(&sig, &tampered));
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    fn secret() -> CredentialSecret {
        CredentialSecret::new("proptest-signing-secret-0123456789abcdef")
    }

    proptest! {
        /// Property: determinism over arbitrary field contents.
        #[test]
        fn prop_sign_deterministic(
            visitor in "[a-z0-9-]{1,40}",
            unit in "[a-z0-9-]{1,40}",
            valid_until in "[A-Za-z0-9:.TZ-]{1,40}",
            nonce in "[A-Za-z0-9_-]{1,30}",
        ) {
            let a = sign_credential(&secret(), &visitor, &unit, &valid_until, &nonce);
            let b = sign_credential(&secret(), &visitor, &unit, &valid_until, &nonce);
            prop_assert_eq!(a, b);
        }

        /// Property: a mutated nonce never verifies against the original.
        #[test]
        fn prop_mutated_nonce_rejected(
            nonce in "[A-Za-z0-9_-]{10,30}",
            other in "[A-Za-z0-9_-]{10,30}",
        ) {
            prop_assume!(nonce != other);
            let original = sign_credential(&secret(), "v", "u", "t", &nonce);
            let forged = sign_credential(&secret(), "v", "u", "t", &other);
            prop_assert!(!signatures_match(&original, &forged));
        }

        /// Property: round-trip through the hex wire form always verifies.
        #[test]
        fn prop_hex_round_trip_verifies(
            visitor in "[a-z0-9-]{1,40}",
            nonce in "[A-Za-z0-9_-]{1,30}",
        ) {
            let sig = sign_credential(&secret(), &visitor, "u", "t", &nonce);
            prop_assert!(verify_presented_signature(&sig, &sig.to_string()));
        }
    }
}
