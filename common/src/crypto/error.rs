use thiserror::Error;

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid base58 string")]
    InvalidBase58,

    #[error("Invalid length: expected {expected} bytes, got {got}")]
    InvalidLength { expected: usize, got: usize },

    #[error("Invalid public key bytes")]
    InvalidPublicKey,

    #[error("Keypair public half does not match its secret")]
    KeypairMismatch,

    #[error("Signature verification failed")]
    InvalidSignature,
}
