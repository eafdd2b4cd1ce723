//! Veilnet Cryptographic Primitives
//!
//! This crate provides all cryptographic operations for the veilnet overlay:
//! - Asymmetric key pairs (RSA-OAEP with SHA-256)
//! - Symmetric encryption (AES-256-CBC, random IV per message)
//! - Layered envelope construction and peeling for onion routing
//!
//! Keys and ciphertexts cross process boundaries as base64 text; the
//! asymmetric block of an envelope layer has a fixed encoded length derived
//! from the key's modulus, which is what makes peeling self-describing.

pub mod error;
pub mod keys;
pub mod onion;
pub mod symmetric;

pub use error::{CryptoError, CryptoResult};
pub use keys::{asymmetric_decrypt, asymmetric_encrypt, KeyPair, PrivateKey, PublicKey};
pub use onion::{build_envelope, peel_layer, NodeId, PathHop, PeeledLayer};
pub use symmetric::{symmetric_decrypt, symmetric_encrypt, SymmetricKey};

/// Protocol constants
pub mod constants {
    /// RSA modulus size in bits
    pub const RSA_MODULUS_BITS: usize = 2048;

    /// OAEP overhead for SHA-256: 2 * hash_len + 2
    pub const OAEP_OVERHEAD: usize = 2 * 32 + 2;

    /// AES-256 key size in bytes
    pub const SYMMETRIC_KEY_SIZE: usize = 32;

    /// AES block / IV size in bytes
    pub const IV_SIZE: usize = 16;

    /// Width of the zero-padded decimal hop id field in a peeled layer
    pub const HOP_ID_WIDTH: usize = 10;
}

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;

/// Encode bytes as standard base64 text.
pub fn encode_b64(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode standard base64 text.
pub fn decode_b64(text: &str) -> CryptoResult<Vec<u8>> {
    BASE64
        .decode(text)
        .map_err(|e| CryptoError::MalformedCiphertext(e.to_string()))
}

/// Encoded length of a base64 string for `len` raw bytes (with padding).
pub fn b64_len(len: usize) -> usize {
    len.div_ceil(3) * 4
}
