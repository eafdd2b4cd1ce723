//! RSA-OAEP Key Pairs
//!
//! Long-term asymmetric keys for relay nodes. Each relay generates one pair
//! for its lifetime; the public half is published through the directory, the
//! private half never leaves the process (outside the explicit debug export).
//!
//! Keys are exported as base64 text: SPKI DER for public keys, PKCS#8 DER
//! for private keys. The encoding round-trips exactly.

use rand::rngs::OsRng;
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::traits::PublicKeyParts;
use rsa::{Oaep, RsaPrivateKey, RsaPublicKey};
use sha2::Sha256;

use crate::constants::{OAEP_OVERHEAD, RSA_MODULUS_BITS};
use crate::error::{CryptoError, CryptoResult};
use crate::{b64_len, decode_b64, encode_b64};

/// An RSA public key
#[derive(Clone, PartialEq, Eq)]
pub struct PublicKey {
    inner: RsaPublicKey,
}

/// An RSA private key, owned exclusively by the relay that generated it
#[derive(Clone)]
pub struct PrivateKey {
    inner: RsaPrivateKey,
}

/// A keypair containing both halves
#[derive(Clone)]
pub struct KeyPair {
    pub public: PublicKey,
    pub private: PrivateKey,
}

impl KeyPair {
    /// Generate a fresh random keypair
    pub fn generate() -> CryptoResult<Self> {
        let private = RsaPrivateKey::new(&mut OsRng, RSA_MODULUS_BITS)
            .map_err(|e| CryptoError::KeyGeneration(e.to_string()))?;
        let public = RsaPublicKey::from(&private);

        Ok(Self {
            public: PublicKey { inner: public },
            private: PrivateKey { inner: private },
        })
    }
}

impl PublicKey {
    /// Export as base64-encoded SPKI DER
    pub fn to_base64(&self) -> CryptoResult<String> {
        let der = self
            .inner
            .to_public_key_der()
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(encode_b64(der.as_bytes()))
    }

    /// Import from base64-encoded SPKI DER
    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        let der = decode_b64(text).map_err(|_| {
            CryptoError::InvalidKeyEncoding("public key is not valid base64".into())
        })?;
        let inner = RsaPublicKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Modulus size in bytes (the raw asymmetric ciphertext length)
    pub fn modulus_len(&self) -> usize {
        self.inner.size()
    }

    /// Largest plaintext this key can encrypt under OAEP
    pub fn max_plaintext_len(&self) -> usize {
        self.modulus_len() - OAEP_OVERHEAD
    }

    /// Encoded length of one asymmetric ciphertext block, derived from the
    /// modulus at runtime. Used as the split point when peeling a layer.
    pub fn encoded_ciphertext_len(&self) -> usize {
        b64_len(self.modulus_len())
    }
}

impl std::fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PublicKey({} bits)", self.modulus_len() * 8)
    }
}

impl PrivateKey {
    /// Export as base64-encoded PKCS#8 DER. Handle with care.
    pub fn to_base64(&self) -> CryptoResult<String> {
        let der = self
            .inner
            .to_pkcs8_der()
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(encode_b64(der.as_bytes()))
    }

    /// Import from base64-encoded PKCS#8 DER
    pub fn from_base64(text: &str) -> CryptoResult<Self> {
        let der = decode_b64(text).map_err(|_| {
            CryptoError::InvalidKeyEncoding("private key is not valid base64".into())
        })?;
        let inner = RsaPrivateKey::from_pkcs8_der(&der)
            .map_err(|e| CryptoError::InvalidKeyEncoding(e.to_string()))?;
        Ok(Self { inner })
    }

    /// Modulus size in bytes
    pub fn modulus_len(&self) -> usize {
        self.inner.size()
    }

    /// Encoded length of one asymmetric ciphertext block under this key
    pub fn encoded_ciphertext_len(&self) -> usize {
        b64_len(self.modulus_len())
    }

    /// The matching public key
    pub fn public_key(&self) -> PublicKey {
        PublicKey {
            inner: RsaPublicKey::from(&self.inner),
        }
    }
}

impl std::fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "PrivateKey({} bits)", self.modulus_len() * 8)
    }
}

/// Encrypt a bounded plaintext under a public key
pub fn asymmetric_encrypt(public: &PublicKey, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    let max = public.max_plaintext_len();
    if plaintext.len() > max {
        return Err(CryptoError::PayloadTooLarge {
            max,
            actual: plaintext.len(),
        });
    }

    public
        .inner
        .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
        .map_err(|e| CryptoError::EncryptionFailed(e.to_string()))
}

/// Decrypt an asymmetric ciphertext produced under the matching public key
pub fn asymmetric_decrypt(private: &PrivateKey, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    private
        .inner
        .decrypt(Oaep::new::<Sha256>(), ciphertext)
        .map_err(|_| CryptoError::DecryptionFailed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_sizes() {
        let pair = KeyPair::generate().unwrap();
        assert_eq!(pair.public.modulus_len(), RSA_MODULUS_BITS / 8);
        assert_eq!(pair.public.max_plaintext_len(), 256 - OAEP_OVERHEAD);
        // 256 raw bytes encode to 344 base64 characters
        assert_eq!(pair.public.encoded_ciphertext_len(), 344);
        assert_eq!(
            pair.private.encoded_ciphertext_len(),
            pair.public.encoded_ciphertext_len()
        );
    }

    #[test]
    fn test_public_key_export_round_trip() {
        let pair = KeyPair::generate().unwrap();
        let exported = pair.public.to_base64().unwrap();
        let imported = PublicKey::from_base64(&exported).unwrap();
        assert_eq!(imported.to_base64().unwrap(), exported);
        assert_eq!(imported, pair.public);
    }

    #[test]
    fn test_private_key_export_round_trip() {
        let pair = KeyPair::generate().unwrap();
        let exported = pair.private.to_base64().unwrap();
        let imported = PrivateKey::from_base64(&exported).unwrap();
        assert_eq!(imported.to_base64().unwrap(), exported);
    }

    #[test]
    fn test_bad_key_encoding_rejected() {
        assert!(PublicKey::from_base64("not base64 at all!!!").is_err());
        assert!(PublicKey::from_base64(&crate::encode_b64(b"not a key")).is_err());
    }

    #[test]
    fn test_encrypt_decrypt() {
        let pair = KeyPair::generate().unwrap();
        let plaintext = b"layer key material";

        let ciphertext = asymmetric_encrypt(&pair.public, plaintext).unwrap();
        assert_eq!(ciphertext.len(), pair.public.modulus_len());

        let decrypted = asymmetric_decrypt(&pair.private, &ciphertext).unwrap();
        assert_eq!(decrypted, plaintext);
    }

    #[test]
    fn test_oversized_plaintext_rejected() {
        let pair = KeyPair::generate().unwrap();
        let too_big = vec![0u8; pair.public.max_plaintext_len() + 1];

        let result = asymmetric_encrypt(&pair.public, &too_big);
        assert!(matches!(
            result,
            Err(CryptoError::PayloadTooLarge { .. })
        ));
    }

    #[test]
    fn test_wrong_key_fails() {
        let pair = KeyPair::generate().unwrap();
        let other = KeyPair::generate().unwrap();

        let ciphertext = asymmetric_encrypt(&pair.public, b"secret").unwrap();
        let result = asymmetric_decrypt(&other.private, &ciphertext);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_corrupted_ciphertext_fails() {
        let pair = KeyPair::generate().unwrap();
        let mut ciphertext = asymmetric_encrypt(&pair.public, b"secret").unwrap();
        ciphertext[10] ^= 0xFF;

        let result = asymmetric_decrypt(&pair.private, &ciphertext);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }
}
