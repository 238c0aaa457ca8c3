//! Nonce generation for issued credentials.

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use gatehouse_types::Nonce;
use rand::RngCore;
use rand::rngs::OsRng;

/// Bytes of entropy drawn for each nonce (128 bits).
pub const NONCE_ENTROPY_BYTES: usize = 16;

/// Generates a fresh credential nonce from the OS CSPRNG.
///
/// 128 bits of entropy makes collision between any two issued credentials
/// negligible, which is what lets (nonce, signature) serve as the unique
/// lookup key without a secondary uniqueness check. Encoded URL-safe without
/// padding so the nonce survives query strings and QR payloads untouched.
pub fn generate_nonce() -> Nonce {
    let mut bytes = [0u8; NONCE_ENTROPY_BYTES];
    OsRng.fill_bytes(&mut bytes);
    Nonce::new(URL_SAFE_NO_PAD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_nonce_length_and_alphabet() {
        let nonce = generate_nonce();
        // 16 bytes -> ceil(16 * 4 / 3) = 22 chars unpadded
        assert_eq!(nonce.as_str().len(), 22);
        assert!(
            nonce
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn test_nonces_do_not_repeat() {
        let nonces: HashSet<String> = (0..1000)
            .map(|_| generate_nonce().as_str().to_string())
            .collect();
        assert_eq!(nonces.len(), 1000);
    }
}
