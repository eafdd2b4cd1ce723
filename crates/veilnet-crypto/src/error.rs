//! Cryptographic error types

use thiserror::Error;

/// Errors that can occur during cryptographic operations
#[derive(Debug, Error)]
pub enum CryptoError {
    /// Key pair generation failed (entropy source or parameter failure)
    #[error("Key generation failed: {0}")]
    KeyGeneration(String),

    /// A key could not be decoded from its transport encoding
    #[error("Invalid key encoding: {0}")]
    InvalidKeyEncoding(String),

    /// Raw key material has the wrong length
    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength { expected: usize, actual: usize },

    /// Plaintext exceeds the asymmetric capacity of the key
    #[error("Payload too large for asymmetric encryption: max {max}, got {actual}")]
    PayloadTooLarge { max: usize, actual: usize },

    /// Encryption failed (RNG or backend failure)
    #[error("Encryption failed: {0}")]
    EncryptionFailed(String),

    /// Wrong key or corrupted ciphertext
    #[error("Decryption failed")]
    DecryptionFailed,

    /// Ciphertext is structurally invalid (bad length or encoding)
    #[error("Malformed ciphertext: {0}")]
    MalformedCiphertext(String),

    /// An envelope layer could not be split or parsed
    #[error("Malformed layer: {0}")]
    MalformedLayer(String),

    /// A path must contain at least one hop
    #[error("Envelope path must have at least one hop")]
    EmptyPath,
}

/// Result type for cryptographic operations
pub type CryptoResult<T> = Result<T, CryptoError>;
