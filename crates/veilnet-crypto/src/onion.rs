//! Envelope Construction and Peeling
//!
//! The layered-encryption protocol at the center of the overlay. The sender
//! wraps a payload once per hop, innermost first; each relay peels exactly
//! one layer and learns only the next hop's id.
//!
//! One layer, as text:
//!
//! ```text
//! [asymmetric block][symmetric block]
//! ```
//!
//! The asymmetric block is the hop's layer key encrypted under its RSA
//! public key, base64-encoded to a fixed character length derived from the
//! key's modulus (344 characters for 2048-bit keys); that fixed length is
//! the split point when peeling. The symmetric block is the wrapped content
//! encrypted under the layer key. Inside each symmetric block the content
//! starts with the next hop's id as a zero-padded 10-character decimal
//! field, followed by the remaining (still layered) payload.

use crate::constants::HOP_ID_WIDTH;
use crate::error::{CryptoError, CryptoResult};
use crate::keys::{asymmetric_decrypt, asymmetric_encrypt, PrivateKey, PublicKey};
use crate::symmetric::{symmetric_decrypt, symmetric_encrypt, SymmetricKey};
use crate::{decode_b64, encode_b64};

/// Node identifier within the overlay
pub type NodeId = u32;

/// One hop of a planned path: the relay's id and its published key
#[derive(Clone, Debug)]
pub struct PathHop {
    pub id: NodeId,
    pub public_key: PublicKey,
}

/// Result of peeling one layer
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PeeledLayer {
    /// Where the remainder should be forwarded
    pub next_hop: NodeId,
    /// The inner payload: either the next layer, or the plaintext message
    /// once every relay layer has been removed
    pub remainder: String,
}

/// Encode a hop id as a fixed-width decimal field
pub fn encode_hop_id(id: NodeId) -> String {
    format!("{:0width$}", id, width = HOP_ID_WIDTH)
}

/// Decode a fixed-width decimal hop id field
pub fn decode_hop_id(field: &str) -> CryptoResult<NodeId> {
    field
        .parse::<NodeId>()
        .map_err(|_| CryptoError::MalformedLayer(format!("invalid hop id field {field:?}")))
}

/// Build a layered envelope for `path`, addressed to `destination`.
///
/// Layers are applied from the last hop to the first, so the relay at
/// `path[0]` can peel first. The returned text is the outermost layer with
/// its own hop marker stripped: the caller already knows the first hop and
/// routes the initial send directly.
pub fn build_envelope(
    path: &[PathHop],
    destination: NodeId,
    message: &str,
) -> CryptoResult<String> {
    if path.is_empty() {
        return Err(CryptoError::EmptyPath);
    }

    let mut payload = format!("{}{}", encode_hop_id(destination), message);

    for hop in path.iter().rev() {
        let key = SymmetricKey::generate();

        let sym_block = encode_b64(&symmetric_encrypt(&key, payload.as_bytes()));
        let asym_block = encode_b64(&asymmetric_encrypt(
            &hop.public_key,
            key.to_base64().as_bytes(),
        )?);

        payload = format!("{}{}{}", encode_hop_id(hop.id), asym_block, sym_block);
    }

    Ok(payload[HOP_ID_WIDTH..].to_string())
}

/// Peel one layer with the receiving relay's private key.
///
/// The exact left-inverse of one build step: splits the layer at the
/// asymmetric block length derived from the key's modulus, recovers the
/// layer key, decrypts the symmetric block, and slices off the hop marker.
pub fn peel_layer(private: &PrivateKey, layer: &str) -> CryptoResult<PeeledLayer> {
    let split = private.encoded_ciphertext_len();
    if layer.len() < split || !layer.is_char_boundary(split) {
        return Err(CryptoError::MalformedLayer(format!(
            "layer of {} characters is shorter than one asymmetric block ({split})",
            layer.len()
        )));
    }
    let (asym_block, sym_block) = layer.split_at(split);

    let key_material = asymmetric_decrypt(private, &decode_b64(asym_block)?)?;
    let key_text = String::from_utf8(key_material)
        .map_err(|_| CryptoError::MalformedLayer("layer key is not valid text".into()))?;
    let key = SymmetricKey::from_base64(&key_text)?;

    let inner = symmetric_decrypt(&key, &decode_b64(sym_block)?)?;
    let inner = String::from_utf8(inner)
        .map_err(|_| CryptoError::MalformedLayer("wrapped content is not valid text".into()))?;

    if inner.len() < HOP_ID_WIDTH || !inner.is_char_boundary(HOP_ID_WIDTH) {
        return Err(CryptoError::MalformedLayer(format!(
            "wrapped content of {} characters has no hop id field",
            inner.len()
        )));
    }
    let (id_field, remainder) = inner.split_at(HOP_ID_WIDTH);

    Ok(PeeledLayer {
        next_hop: decode_hop_id(id_field)?,
        remainder: remainder.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::KeyPair;

    fn make_path(pairs: &[KeyPair]) -> Vec<PathHop> {
        pairs
            .iter()
            .enumerate()
            .map(|(i, pair)| PathHop {
                id: (i + 1) as NodeId,
                public_key: pair.public.clone(),
            })
            .collect()
    }

    /// Peel every layer in path order and return the delivered plaintext.
    fn peel_all(pairs: &[KeyPair], envelope: String, destination: NodeId) -> String {
        let mut layer = envelope;
        for (i, pair) in pairs.iter().enumerate() {
            let peeled = peel_layer(&pair.private, &layer).expect("peel failed");
            if i + 1 == pairs.len() {
                assert_eq!(peeled.next_hop, destination);
            } else {
                assert_eq!(peeled.next_hop, (i + 2) as NodeId);
            }
            layer = peeled.remainder;
        }
        layer
    }

    #[test]
    fn test_hop_id_field_round_trip() {
        assert_eq!(encode_hop_id(7), "0000000007");
        assert_eq!(encode_hop_id(NodeId::MAX).len(), HOP_ID_WIDTH);
        assert_eq!(decode_hop_id("0000000042").unwrap(), 42);
        assert!(decode_hop_id("00000000x7").is_err());
    }

    #[test]
    fn test_empty_path_rejected() {
        assert!(matches!(
            build_envelope(&[], 99, "hello"),
            Err(CryptoError::EmptyPath)
        ));
    }

    #[test]
    fn test_single_hop_round_trip() {
        let pairs = vec![KeyPair::generate().unwrap()];
        let path = make_path(&pairs);

        let envelope = build_envelope(&path, 99, "hello").unwrap();
        let peeled = peel_layer(&pairs[0].private, &envelope).unwrap();

        assert_eq!(peeled.next_hop, 99);
        assert_eq!(peeled.remainder, "hello");
    }

    /// A one-hop envelope is exactly plain hybrid encryption: the layer is
    /// an RSA-wrapped key plus an AES-encrypted payload, nothing more.
    #[test]
    fn test_single_hop_is_plain_hybrid() {
        let pair = KeyPair::generate().unwrap();
        let path = make_path(std::slice::from_ref(&pair));

        let envelope = build_envelope(&path, 99, "hello").unwrap();
        let split = pair.private.encoded_ciphertext_len();

        let key_text = asymmetric_decrypt(&pair.private, &decode_b64(&envelope[..split]).unwrap())
            .unwrap();
        let key = SymmetricKey::from_base64(std::str::from_utf8(&key_text).unwrap()).unwrap();
        let inner =
            symmetric_decrypt(&key, &decode_b64(&envelope[split..]).unwrap()).unwrap();

        assert_eq!(inner, format!("{}hello", encode_hop_id(99)).into_bytes());
    }

    #[test]
    fn test_multi_hop_round_trip() {
        for hops in 2..=5 {
            let pairs: Vec<KeyPair> = (0..hops).map(|_| KeyPair::generate().unwrap()).collect();
            let path = make_path(&pairs);

            let envelope = build_envelope(&path, 99, "through the onion").unwrap();
            let delivered = peel_all(&pairs, envelope, 99);
            assert_eq!(delivered, "through the onion");
        }
    }

    #[test]
    fn test_empty_message_round_trip() {
        let pairs: Vec<KeyPair> = (0..2).map(|_| KeyPair::generate().unwrap()).collect();
        let path = make_path(&pairs);

        let envelope = build_envelope(&path, 3, "").unwrap();
        assert_eq!(peel_all(&pairs, envelope, 3), "");
    }

    #[test]
    fn test_wrong_key_rejected() {
        let pairs = vec![KeyPair::generate().unwrap()];
        let other = KeyPair::generate().unwrap();
        let path = make_path(&pairs);

        let envelope = build_envelope(&path, 99, "hello").unwrap();
        let result = peel_layer(&other.private, &envelope);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_asymmetric_block_rejected() {
        let pairs = vec![KeyPair::generate().unwrap()];
        let path = make_path(&pairs);

        let mut envelope = build_envelope(&path, 99, "hello").unwrap().into_bytes();
        // Swap a character inside the asymmetric block for a different
        // base64 character.
        envelope[100] = if envelope[100] == b'A' { b'B' } else { b'A' };
        let envelope = String::from_utf8(envelope).unwrap();

        let result = peel_layer(&pairs[0].private, &envelope);
        assert!(matches!(result, Err(CryptoError::DecryptionFailed)));
    }

    #[test]
    fn test_tampered_symmetric_block_rejected() {
        let pairs = vec![KeyPair::generate().unwrap()];
        let path = make_path(&pairs);

        let envelope = build_envelope(&path, 99, "hello").unwrap();
        let split = pairs[0].private.encoded_ciphertext_len();

        let mut bytes = envelope.into_bytes();
        // Corrupt the first symmetric ciphertext block; the hop id field it
        // carries cannot survive as ten decimal digits.
        bytes[split + 30] = if bytes[split + 30] == b'A' { b'B' } else { b'A' };
        let envelope = String::from_utf8(bytes).unwrap();

        let result = peel_layer(&pairs[0].private, &envelope);
        assert!(result.is_err());
    }

    #[test]
    fn test_truncated_layer_rejected() {
        let pair = KeyPair::generate().unwrap();
        let result = peel_layer(&pair.private, "too short");
        assert!(matches!(result, Err(CryptoError::MalformedLayer(_))));
    }
}
