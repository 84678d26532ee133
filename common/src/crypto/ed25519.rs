use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use ed25519_dalek::{Signer as DalekSigner, SigningKey, Verifier, VerifyingKey};
use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};

use crate::serializer::{Reader, ReaderError, Serializer, Writer};

use super::CryptoError;

pub const PUBKEY_SIZE: usize = 32;
pub const SIGNATURE_SIZE: usize = 64;
// Pre-decoded signing material: 32-byte seed followed by the 32-byte public key
pub const KEYPAIR_SIZE: usize = 64;

/// An account identifier on the chain, base58 on every external surface.
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Pubkey([u8; PUBKEY_SIZE]);

impl Pubkey {
    pub const fn new(bytes: [u8; PUBKEY_SIZE]) -> Self {
        Pubkey(bytes)
    }

    pub const fn zero() -> Self {
        Pubkey::new([0; PUBKEY_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; PUBKEY_SIZE] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl Serializer for Pubkey {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Pubkey(reader.read_array::<PUBKEY_SIZE>()?))
    }
}

impl FromStr for Pubkey {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| CryptoError::InvalidBase58)?;
        let array: [u8; PUBKEY_SIZE] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidLength {
                expected: PUBKEY_SIZE,
                got: v.len(),
            })?;
        Ok(Pubkey(array))
    }
}

impl Display for Pubkey {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl Serialize for Pubkey {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Pubkey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Pubkey::from_str(&s).map_err(SerdeError::custom)
    }
}

/// A detached ed25519 signature.
#[derive(Eq, PartialEq, Clone, Copy, Debug)]
pub struct Signature([u8; SIGNATURE_SIZE]);

impl Signature {
    pub const fn new(bytes: [u8; SIGNATURE_SIZE]) -> Self {
        Signature(bytes)
    }

    // All-zero placeholder for a signer slot that has not signed yet
    pub const fn zero() -> Self {
        Signature::new([0; SIGNATURE_SIZE])
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == [0; SIGNATURE_SIZE]
    }

    pub fn as_bytes(&self) -> &[u8; SIGNATURE_SIZE] {
        &self.0
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

impl Serializer for Signature {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Signature(reader.read_array::<SIGNATURE_SIZE>()?))
    }
}

impl FromStr for Signature {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| CryptoError::InvalidBase58)?;
        let array: [u8; SIGNATURE_SIZE] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidLength {
                expected: SIGNATURE_SIZE,
                got: v.len(),
            })?;
        Ok(Signature(array))
    }
}

impl Display for Signature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl Serialize for Signature {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Signature {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Signature::from_str(&s).map_err(SerdeError::custom)
    }
}

// Verify a detached signature against a public key
pub fn verify_signature(pubkey: &Pubkey, message: &[u8], signature: &Signature) -> bool {
    let Ok(key) = VerifyingKey::from_bytes(pubkey.as_bytes()) else {
        return false;
    };
    let sig = ed25519_dalek::Signature::from_bytes(signature.as_bytes());
    key.verify(message, &sig).is_ok()
}

/// Signing material for a fee-payer account.
///
/// Built from the pre-decoded 64-byte base58 form (seed + public key); the
/// derived public half is checked against the embedded one so a truncated or
/// spliced key fails at boot instead of producing bad signatures.
pub struct Keypair {
    signing: SigningKey,
    pubkey: Pubkey,
}

impl Keypair {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CryptoError> {
        if bytes.len() != KEYPAIR_SIZE {
            return Err(CryptoError::InvalidLength {
                expected: KEYPAIR_SIZE,
                got: bytes.len(),
            });
        }
        let seed: [u8; 32] = bytes[..32].try_into().unwrap();
        let embedded: [u8; 32] = bytes[32..].try_into().unwrap();
        let signing = SigningKey::from_bytes(&seed);
        if signing.verifying_key().to_bytes() != embedded {
            return Err(CryptoError::KeypairMismatch);
        }
        Ok(Self {
            signing,
            pubkey: Pubkey::new(embedded),
        })
    }

    pub fn from_base58_string(s: &str) -> Result<Self, CryptoError> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| CryptoError::InvalidBase58)?;
        Self::from_bytes(&bytes)
    }

    // Deterministic keypair from a seed, test helper
    pub fn from_seed(seed: [u8; 32]) -> Self {
        let signing = SigningKey::from_bytes(&seed);
        let pubkey = Pubkey::new(signing.verifying_key().to_bytes());
        Self { signing, pubkey }
    }

    pub fn pubkey(&self) -> &Pubkey {
        &self.pubkey
    }

    pub fn sign(&self, message: &[u8]) -> Signature {
        let sig = self.signing.sign(message);
        Signature::new(sig.to_bytes())
    }

    pub fn to_base58_string(&self) -> String {
        let mut bytes = Vec::with_capacity(KEYPAIR_SIZE);
        bytes.extend_from_slice(&self.signing.to_bytes());
        bytes.extend_from_slice(self.pubkey.as_bytes());
        bs58::encode(bytes).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let keypair = Keypair::from_seed([7; 32]);
        let signature = keypair.sign(b"message");
        assert!(verify_signature(keypair.pubkey(), b"message", &signature));
        assert!(!verify_signature(keypair.pubkey(), b"other", &signature));
    }

    #[test]
    fn test_keypair_base58_round_trip() {
        let keypair = Keypair::from_seed([1; 32]);
        let restored = Keypair::from_base58_string(&keypair.to_base58_string()).unwrap();
        assert_eq!(restored.pubkey(), keypair.pubkey());
    }

    #[test]
    fn test_spliced_keypair_rejected() {
        let a = Keypair::from_seed([1; 32]);
        let b = Keypair::from_seed([2; 32]);
        let mut bytes = Vec::new();
        bytes.extend_from_slice(&a.signing.to_bytes());
        bytes.extend_from_slice(b.pubkey().as_bytes());
        assert!(matches!(
            Keypair::from_bytes(&bytes),
            Err(CryptoError::KeypairMismatch)
        ));
    }

    #[test]
    fn test_pubkey_parse_rejects_bad_length() {
        assert!(Pubkey::from_str("abc").is_err());
    }
}
