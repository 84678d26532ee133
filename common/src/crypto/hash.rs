use std::{
    fmt::{Display, Formatter},
    str::FromStr,
};

use serde::{de::Error as SerdeError, Deserialize, Deserializer, Serialize, Serializer as SerdeSerializer};
use sha2::{Digest, Sha256};

use crate::serializer::{Reader, ReaderError, Serializer, Writer};

use super::CryptoError;

pub const HASH_SIZE: usize = 32; // 32 bytes / 256 bits

/// A 32-byte digest: blockhashes and transaction fingerprints.
///
/// Displayed in base58 like the chain does; `to_hex` is available where a
/// lowercase fixed-width key is more convenient (hot-store keys).
#[derive(Eq, PartialEq, PartialOrd, Ord, Clone, Copy, Debug, Hash)]
pub struct Hash([u8; HASH_SIZE]);

impl Hash {
    pub const fn new(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub const fn zero() -> Self {
        Hash::new([0; HASH_SIZE])
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_bytes(self) -> [u8; HASH_SIZE] {
        self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn to_base58(&self) -> String {
        bs58::encode(self.0).into_string()
    }
}

// SHA-256 over arbitrary bytes, the relay's fingerprint function
pub fn hash_bytes(data: &[u8]) -> Hash {
    let digest = Sha256::digest(data);
    Hash(digest.into())
}

impl Serializer for Hash {
    fn write(&self, writer: &mut Writer) {
        writer.write_bytes(&self.0);
    }

    fn read(reader: &mut Reader) -> Result<Self, ReaderError> {
        Ok(Hash(reader.read_array::<HASH_SIZE>()?))
    }
}

impl FromStr for Hash {
    type Err = CryptoError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let bytes = bs58::decode(s)
            .into_vec()
            .map_err(|_| CryptoError::InvalidBase58)?;
        let array: [u8; HASH_SIZE] = bytes
            .try_into()
            .map_err(|v: Vec<u8>| CryptoError::InvalidLength {
                expected: HASH_SIZE,
                got: v.len(),
            })?;
        Ok(Hash(array))
    }
}

impl Display for Hash {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_base58())
    }
}

impl Serialize for Hash {
    fn serialize<S: SerdeSerializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_base58())
    }
}

impl<'de> Deserialize<'de> for Hash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Hash::from_str(&s).map_err(SerdeError::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fingerprint_is_deterministic() {
        let a = hash_bytes(b"same bytes");
        let b = hash_bytes(b"same bytes");
        let c = hash_bytes(b"other bytes");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_base58_round_trip() {
        let hash = hash_bytes(b"round trip");
        let parsed = Hash::from_str(&hash.to_base58()).unwrap();
        assert_eq!(hash, parsed);
    }

    #[test]
    fn test_serializer_round_trip() {
        let hash = hash_bytes(b"wire");
        let decoded = Hash::from_bytes(&hash.to_bytes()).unwrap();
        assert_eq!(hash, decoded);
    }
}
