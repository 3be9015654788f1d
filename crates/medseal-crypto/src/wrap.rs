//! Per-recipient key wrapping.
//!
//! The data key is wrapped once per recipient under the ECDH key shared by
//! the sender and that recipient. Every recipient costs one independent
//! derivation; there is no shared KEK, so one recipient's shared secret
//! opens nothing but that recipient's record.
//!
//! The wrapped plaintext is the base64 text of the data key, matching the
//! browser implementation that exports the AES key as base64 before
//! encrypting it.

use std::collections::BTreeMap;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::trace;
use zeroize::Zeroizing;

use crate::cipher;
use crate::ecdh::derive_shared_key;
use crate::error::{CryptoError, CryptoResult};
use crate::format::{base64_bytes, base64_decode, base64_encode};
use crate::keys::{PrivateKey, PublicKey};
use crate::recipient::{RecipientId, Recipients};

/// The data key encrypted for one recipient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrappedKeyRecord {
    /// Encrypted data key with the GCM tag appended.
    #[serde(with = "base64_bytes")]
    pub ciphertext: Vec<u8>,

    /// Nonce used for this wrap.
    #[serde(rename = "iv", with = "base64_bytes")]
    pub nonce: Vec<u8>,
}

/// Wrap `data_key` so that only the holder of the private key matching
/// `recipient_public` can recover it, given `sender_private`'s public key.
pub fn wrap_key_for_recipient(
    data_key: &[u8],
    sender_private: &PrivateKey,
    recipient_public: &PublicKey,
) -> CryptoResult<WrappedKeyRecord> {
    let shared = derive_shared_key(sender_private, recipient_public);
    let encoded = Zeroizing::new(base64_encode(data_key));
    let sealed = cipher::encrypt(encoded.as_bytes(), &shared)?;

    Ok(WrappedKeyRecord {
        ciphertext: sealed.ciphertext,
        nonce: sealed.nonce.to_vec(),
    })
}

/// Recover the data key from a record wrapped for us.
///
/// Fails with [`CryptoError::Authentication`] when the private key is not
/// the intended recipient's, the sender key is wrong, or the record was
/// modified.
pub fn unwrap_key(
    record: &WrappedKeyRecord,
    recipient_private: &PrivateKey,
    sender_public: &PublicKey,
) -> CryptoResult<Zeroizing<Vec<u8>>> {
    let shared = derive_shared_key(recipient_private, sender_public);
    let encoded = Zeroizing::new(cipher::decrypt(&record.ciphertext, &shared, &record.nonce)?);

    let text = std::str::from_utf8(&encoded).map_err(|_| CryptoError::Authentication)?;
    let data_key = base64_decode(text).map_err(|_| CryptoError::Authentication)?;
    Ok(Zeroizing::new(data_key))
}

/// Wrap `data_key` for every recipient.
///
/// At or above `parallel_threshold` recipients the wraps run on the rayon
/// pool; each wrap is independent so the result is identical either way
/// (apart from fresh nonces).
pub fn wrap_for_recipients(
    data_key: &[u8],
    sender_private: &PrivateKey,
    recipients: &Recipients,
    parallel_threshold: usize,
) -> CryptoResult<BTreeMap<RecipientId, WrappedKeyRecord>> {
    let wrap_one = |(id, public): (&RecipientId, &PublicKey)| {
        trace!(recipient_id = %id, "Wrapping data key");
        wrap_key_for_recipient(data_key, sender_private, public).map(|record| (id.clone(), record))
    };

    if recipients.len() >= parallel_threshold {
        recipients.par_iter().map(wrap_one).collect()
    } else {
        recipients.iter().map(wrap_one).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cipher::{export_key, generate_key};
    use crate::keys::KeyPair;

    #[test]
    fn test_wrap_unwrap_roundtrip() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        let data_key = export_key(&generate_key());

        let record = wrap_key_for_recipient(&data_key, &sender.private, &recipient.public).unwrap();
        let unwrapped = unwrap_key(&record, &recipient.private, &sender.public).unwrap();

        assert_eq!(*unwrapped, data_key);
    }

    #[test]
    fn test_sender_can_unwrap_own_record() {
        // ECDH symmetry: the sender derives the same shared key from its
        // private key and the recipient's public key.
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        let data_key = export_key(&generate_key());

        let record = wrap_key_for_recipient(&data_key, &sender.private, &recipient.public).unwrap();
        let unwrapped = unwrap_key(&record, &sender.private, &recipient.public).unwrap();
        assert_eq!(*unwrapped, data_key);
    }

    #[test]
    fn test_wrong_recipient_cannot_unwrap() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        let eve = KeyPair::generate();
        let data_key = export_key(&generate_key());

        let record = wrap_key_for_recipient(&data_key, &sender.private, &recipient.public).unwrap();
        assert!(matches!(
            unwrap_key(&record, &eve.private, &sender.public),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_wrong_sender_key_cannot_unwrap() {
        let sender = KeyPair::generate();
        let impostor = KeyPair::generate();
        let recipient = KeyPair::generate();
        let data_key = export_key(&generate_key());

        let record = wrap_key_for_recipient(&data_key, &sender.private, &recipient.public).unwrap();
        assert!(matches!(
            unwrap_key(&record, &recipient.private, &impostor.public),
            Err(CryptoError::Authentication)
        ));
    }

    #[test]
    fn test_tampered_record_every_bit() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        let data_key = export_key(&generate_key());
        let record = wrap_key_for_recipient(&data_key, &sender.private, &recipient.public).unwrap();

        for byte in 0..record.ciphertext.len() {
            for bit in 0..8 {
                let mut tampered = record.clone();
                tampered.ciphertext[byte] ^= 1 << bit;
                assert!(unwrap_key(&tampered, &recipient.private, &sender.public).is_err());
            }
        }
        for byte in 0..record.nonce.len() {
            let mut tampered = record.clone();
            tampered.nonce[byte] ^= 0x80;
            assert!(unwrap_key(&tampered, &recipient.private, &sender.public).is_err());
        }
    }

    #[test]
    fn test_record_wire_names() {
        let sender = KeyPair::generate();
        let recipient = KeyPair::generate();
        let record = wrap_key_for_recipient(&[1u8; 32], &sender.private, &recipient.public).unwrap();

        let json = serde_json::to_value(&record).unwrap();
        assert!(json.get("ciphertext").is_some());
        assert!(json.get("iv").is_some());
        assert!(json.get("nonce").is_none());
    }

    #[test]
    fn test_wrap_for_recipients_sequential_and_parallel() {
        let sender = KeyPair::generate();
        let keys: Vec<KeyPair> = (0..12).map(|_| KeyPair::generate()).collect();
        let recipients: Recipients = keys
            .iter()
            .enumerate()
            .map(|(i, kp)| (RecipientId::new(format!("r{}", i)), kp.public.clone()))
            .collect();
        let data_key = export_key(&generate_key());

        for threshold in [1, usize::MAX] {
            let wrapped = wrap_for_recipients(&data_key, &sender.private, &recipients, threshold)
                .unwrap();
            assert_eq!(wrapped.len(), keys.len());

            for (i, kp) in keys.iter().enumerate() {
                let record = &wrapped[&RecipientId::new(format!("r{}", i))];
                let unwrapped = unwrap_key(record, &kp.private, &sender.public).unwrap();
                assert_eq!(*unwrapped, data_key);
            }
        }
    }

    #[test]
    fn test_records_are_independent() {
        let sender = KeyPair::generate();
        let alice = KeyPair::generate();
        let bob = KeyPair::generate();
        let data_key = export_key(&generate_key());

        let for_alice = wrap_key_for_recipient(&data_key, &sender.private, &alice.public).unwrap();

        // Bob's key does not open Alice's record
        assert!(unwrap_key(&for_alice, &bob.private, &sender.public).is_err());
    }
}
