//! Symmetric Encryption (AES-256-CBC)
//!
//! Per-layer symmetric encryption for envelope payloads. Every encryption
//! draws a fresh random IV and prepends it to the ciphertext; decryption
//! reads the IV prefix back. Keys are single-use: the sender generates one
//! per layer and the receiving relay reconstructs it transiently from the
//! asymmetric block.

use aes::cipher::{block_padding::Pkcs7, BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::RngCore;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::constants::{IV_SIZE, SYMMETRIC_KEY_SIZE};
use crate::error::{CryptoError, CryptoResult};
use crate::{decode_b64, encode_b64};

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;

/// A 256-bit AES key, zeroized on drop
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct SymmetricKey {
    bytes: [u8; SYMMETRIC_KEY_SIZE],
}

impl SymmetricKey {
    /// Generate a random key
    pub fn generate() -> Self {
        let mut bytes = [0u8; SYMMETRIC_KEY_SIZE];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Create a key from raw bytes
    pub fn from_bytes(bytes: [u8; SYMMETRIC_KEY_SIZE]) -> Self {
        Self { bytes }
    }

    /// Try to create from a slice
    pub fn try_from_slice(slice: &[u8]) -> CryptoResult<Self> {
        if slice.len() != SYMMETRIC_KEY_SIZE {
            return Err(CryptoError::InvalidKeyLength {
                expected: SYMMETRIC_KEY_SIZE,
                actual: slice.len(),
            });
        }
        let mut bytes = [0u8; SYMMETRIC_KEY_SIZE];
        bytes.copy_from_slice(slice);
        Ok(Self { bytes })
    }

    /// Export the raw key as base64 text
    pub fn to_base64(&self) -> String {
        encode_b64(&self.bytes)
    }

    /// Import a key from base64 text
    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        let bytes = decode_b64(text)
            .map_err(|_| CryptoError::InvalidKeyEncoding("symmetric key is not valid base64".into()))?;
        Self::try_from_slice(&bytes)
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; SYMMETRIC_KEY_SIZE] {
        &self.bytes
    }
}

/// Encrypt plaintext under a symmetric key
///
/// Returns `[iv (16 bytes)][ciphertext]` with a fresh random IV.
pub fn symmetric_encrypt(key: &SymmetricKey, plaintext: &[u8]) -> Vec<u8> {
    let mut iv = [0u8; IV_SIZE];
    rand::rngs::OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(&key.bytes.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    let mut out = Vec::with_capacity(IV_SIZE + ciphertext.len());
    out.extend_from_slice(&iv);
    out.extend_from_slice(&ciphertext);
    out
}

/// Decrypt `[iv][ciphertext]` produced by [`symmetric_encrypt`]
pub fn symmetric_decrypt(key: &SymmetricKey, data: &[u8]) -> CryptoResult<Vec<u8>> {
    if data.len() < IV_SIZE {
        return Err(CryptoError::MalformedCiphertext(format!(
            "ciphertext shorter than one IV: {} bytes",
            data.len()
        )));
    }

    let (iv, ciphertext) = data.split_at(IV_SIZE);
    let mut iv_bytes = [0u8; IV_SIZE];
    iv_bytes.copy_from_slice(iv);

    Aes256CbcDec::new(&key.bytes.into(), &iv_bytes.into())
        .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encrypt_decrypt() {
        let key = SymmetricKey::generate();
        let plaintext = b"Hello, veilnet!";

        let ciphertext = symmetric_encrypt(&key, plaintext);
        assert_ne!(&ciphertext[IV_SIZE..], plaintext.as_slice());

        let decrypted = symmetric_decrypt(&key, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_fresh_iv_per_encryption() {
        let key = SymmetricKey::generate();
        let plaintext = b"same plaintext";

        let a = symmetric_encrypt(&key, plaintext);
        let b = symmetric_encrypt(&key, plaintext);
        assert_ne!(a, b);
    }

    #[test]
    fn test_wrong_key_fails() {
        let key1 = SymmetricKey::generate();
        let key2 = SymmetricKey::generate();

        let ciphertext = symmetric_encrypt(&key1, b"test message");
        // CBC carries no authenticator; a wrong key either fails padding or
        // yields garbage, never the original plaintext.
        match symmetric_decrypt(&key2, &ciphertext) {
            Err(_) => {}
            Ok(garbage) => assert_ne!(garbage, b"test message"),
        }
    }

    #[test]
    fn test_truncated_ciphertext_rejected() {
        let key = SymmetricKey::generate();
        let result = symmetric_decrypt(&key, &[0u8; IV_SIZE - 1]);
        assert!(matches!(result, Err(CryptoError::MalformedCiphertext(_))));
    }

    #[test]
    fn test_key_export_round_trip() {
        let key = SymmetricKey::generate();
        let exported = key.to_base64();
        let imported = SymmetricKey::from_base64(&exported).unwrap();
        assert_eq!(imported.as_bytes(), key.as_bytes());
        assert_eq!(imported.to_base64(), exported);
    }

    #[test]
    fn test_short_key_rejected() {
        let short = encode_b64(&[0u8; 16]);
        assert!(matches!(
            SymmetricKey::from_base64(&short),
            Err(CryptoError::InvalidKeyLength { .. })
        ));
    }
}
