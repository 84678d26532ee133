mod ed25519;
mod error;
mod hash;

pub use ed25519::{
    verify_signature, Keypair, Pubkey, Signature, KEYPAIR_SIZE, PUBKEY_SIZE, SIGNATURE_SIZE,
};
pub use error::CryptoError;
pub use hash::{hash_bytes, Hash, HASH_SIZE};

use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    // Base-58 shape of an account identifier (32 bytes encode to 32-44 chars)
    static ref BASE58_ACCOUNT_RE: Regex =
        Regex::new("^[1-9A-HJ-NP-Za-km-z]{32,44}$").expect("valid base58 regex");
    // Base-58 shape of a 64-byte signing key
    static ref BASE58_KEYPAIR_RE: Regex =
        Regex::new("^[1-9A-HJ-NP-Za-km-z]{64,96}$").expect("valid base58 keypair regex");
}

// Cheap shape check before attempting a full decode
pub fn is_valid_account_str(s: &str) -> bool {
    BASE58_ACCOUNT_RE.is_match(s)
}

pub fn is_valid_keypair_str(s: &str) -> bool {
    BASE58_KEYPAIR_RE.is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_account_shape() {
        assert!(is_valid_account_str("11111111111111111111111111111111"));
        assert!(is_valid_account_str(
            "TokenkegQfeZyiNwAJbNbGKPFXCWuBvf9Ss623VQ5DA"
        ));
        // 0, I, O and l are not part of the base58 alphabet
        assert!(!is_valid_account_str("0I111111111111111111111111111111"));
        assert!(!is_valid_account_str("too-short"));
    }
}
