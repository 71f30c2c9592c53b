//! The envelope: one secret, one content key, many recipients.
//!
//! ```text
//! Envelope
//!   nonce        12 bytes, random
//!   ciphertext   AES-256-GCM(content_key, plaintext), tag appended
//!   slots[]      one per recipient (+ one sig-challenge slot per
//!                recipient whose signer was present at encryption)
//!     fingerprint  SHA256:... of the recipient public key
//!     kind         rsa-oaep | x25519 | p256 | sig-challenge
//!     share        ephemeral public key / challenge (may be empty)
//!     wrapped_key  the content key, wrapped for this recipient
//! ```

use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use super::encryption;
use super::keys::ContentKey;
use super::wrap::{self, SlotKind};
use crate::errors::{PasshError, Result};
use crate::keyring::{KeyRing, Recipient, Signer};

/// Associated data for the content ciphertext.
pub const FORMAT_TAG: &[u8] = b"passh-envelope-v1";

/// The persisted ciphertext unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub nonce: Vec<u8>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub ciphertext: Vec<u8>,

    pub slots: Vec<Slot>,
}

/// One wrapped copy of the content key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Slot {
    pub fingerprint: String,

    pub kind: SlotKind,

    #[serde(
        default,
        skip_serializing_if = "Vec::is_empty",
        serialize_with = "base64_encode",
        deserialize_with = "base64_decode"
    )]
    pub share: Vec<u8>,

    #[serde(serialize_with = "base64_encode", deserialize_with = "base64_decode")]
    pub wrapped_key: Vec<u8>,
}

impl Envelope {
    /// Fingerprints this envelope is addressed to, without duplicates.
    pub fn recipients(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for slot in &self.slots {
            if !out.contains(&slot.fingerprint.as_str()) {
                out.push(&slot.fingerprint);
            }
        }
        out
    }
}

/// Hybrid encryption over a keyring.
pub struct EnvelopeCipher<'a> {
    keyring: &'a KeyRing,
}

impl<'a> EnvelopeCipher<'a> {
    pub fn new(keyring: &'a KeyRing) -> Self {
        Self { keyring }
    }

    /// Encrypt `plaintext` to every recipient in the keyring.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Envelope> {
        encrypt_to(plaintext, self.keyring.recipients(), self.keyring.signers())
    }

    /// Decrypt with whichever signer in the keyring matches first.
    pub fn decrypt(&self, envelope: &Envelope) -> Result<Zeroizing<Vec<u8>>> {
        decrypt_with(envelope, self.keyring.signers())
    }
}

/// Encrypt `plaintext` to `recipients`.
///
/// Every recipient gets a key-transport slot.  Recipients whose key is
/// also present in `signers` and signs deterministically additionally get
/// a signature-challenge slot, so the entry stays readable through an
/// agent that holds the key.  An agent that cannot sign (gone away, user
/// declined a confirm prompt) only costs its challenge slot; any other
/// signing failure aborts the encryption.
pub fn encrypt_to(plaintext: &[u8], recipients: &[Recipient], signers: &[Signer]) -> Result<Envelope> {
    if recipients.is_empty() {
        return Err(PasshError::NoRecipients);
    }

    let content_key = ContentKey::generate();
    let sealed = encryption::encrypt(content_key.as_bytes(), plaintext, FORMAT_TAG)?;

    let mut slots = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let wrapped = wrap::wrap_for_recipient(recipient.key(), &content_key)?;
        slots.push(Slot::from_wrapped(recipient.fingerprint(), wrapped));

        let signer = signers
            .iter()
            .find(|s| s.fingerprint() == recipient.fingerprint() && s.signs_deterministically());
        if let Some(signer) = signer {
            match wrap::wrap_with_challenge(signer, &content_key) {
                Ok(wrapped) => slots.push(Slot::from_wrapped(recipient.fingerprint(), wrapped)),
                // The agent may have gone away or declined; the transport
                // slot still lets the key file open the entry.
                Err(PasshError::AgentUnavailable(reason)) if signer.is_agent() => tracing::warn!(
                    fingerprint = recipient.fingerprint(),
                    "skipping challenge slot: {reason}"
                ),
                Err(e) => return Err(e),
            }
        }
    }

    tracing::debug!(slots = slots.len(), "sealed envelope");

    Ok(Envelope {
        nonce: sealed.nonce.to_vec(),
        ciphertext: sealed.ciphertext,
        slots,
    })
}

/// Decrypt `envelope` using the first signer that can open one of its
/// slots.
///
/// Errors:
/// - `NoMatchingKey` when no signer is addressed by any slot it can open.
/// - `Integrity` when a matching slot or the ciphertext fails to
///   authenticate.
/// - Agent errors from a matching agent signer, if nothing else worked.
pub fn decrypt_with(envelope: &Envelope, signers: &[Signer]) -> Result<Zeroizing<Vec<u8>>> {
    let mut last_error: Option<PasshError> = None;

    for signer in signers {
        let candidates = envelope
            .slots
            .iter()
            .filter(|slot| slot.fingerprint == signer.fingerprint() && slot.kind.openable_by(signer));

        for slot in candidates {
            tracing::trace!(signer = %signer.describe(), kind = slot.kind.as_str(), "trying slot");
            match wrap::unwrap(signer, slot.kind, &slot.share, &slot.wrapped_key) {
                Ok(content_key) => {
                    return encryption::decrypt(
                        content_key.as_bytes(),
                        &envelope.nonce,
                        &envelope.ciphertext,
                        FORMAT_TAG,
                    );
                }
                Err(e) => {
                    tracing::debug!(kind = slot.kind.as_str(), "slot did not open: {e}");
                    // An integrity failure outranks transient agent errors.
                    if !matches!(last_error, Some(PasshError::Integrity)) {
                        last_error = Some(e);
                    }
                }
            }
        }
    }

    Err(last_error.unwrap_or(PasshError::NoMatchingKey))
}

impl Slot {
    fn from_wrapped(fingerprint: &str, wrapped: wrap::Wrapped) -> Self {
        Self {
            fingerprint: fingerprint.to_string(),
            kind: wrapped.kind,
            share: wrapped.share,
            wrapped_key: wrapped.wrapped_key,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde helpers for base64-encoded Vec<u8> fields
// ---------------------------------------------------------------------------

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;

fn base64_encode<S>(data: &[u8], serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: serde::Serializer,
{
    serializer.serialize_str(&BASE64.encode(data))
}

fn base64_decode<'de, D>(deserializer: D) -> std::result::Result<Vec<u8>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    BASE64.decode(&s).map_err(serde::de::Error::custom)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    use crate::crypto::encryption::NONCE_LEN;

    use rand::rngs::OsRng;
    use ssh_key::{Algorithm, PrivateKey};

    use crate::keyring::{AgentSigner, FileSigner};

    fn ed25519() -> (Recipient, Signer) {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let recipient = Recipient::new(key.public_key().clone());
        let signer = Signer::File(FileSigner::new(key, Path::new("id_ed25519")).unwrap());
        (recipient, signer)
    }

    #[test]
    fn envelope_json_uses_base64_and_omits_empty_share() {
        let envelope = Envelope {
            nonce: vec![0u8; NONCE_LEN],
            ciphertext: vec![1, 2, 3],
            slots: vec![Slot {
                fingerprint: "SHA256:abc".into(),
                kind: SlotKind::RsaOaep,
                share: Vec::new(),
                wrapped_key: vec![9, 9],
            }],
        };
        let json = serde_json::to_string(&envelope).unwrap();
        assert!(json.contains("\"ciphertext\":\"AQID\""));
        assert!(!json.contains("share"));

        let back: Envelope = serde_json::from_str(&json).unwrap();
        assert!(back.slots[0].share.is_empty());
        assert_eq!(back.slots[0].wrapped_key, vec![9, 9]);
    }

    #[test]
    fn signer_present_at_encrypt_adds_challenge_slot() {
        let (recipient, signer) = ed25519();
        let envelope = encrypt_to(b"pw", &[recipient.clone()], &[signer]).unwrap();

        let kinds: Vec<SlotKind> = envelope.slots.iter().map(|s| s.kind).collect();
        assert_eq!(kinds, vec![SlotKind::X25519, SlotKind::SigChallenge]);
        assert_eq!(envelope.recipients(), vec![recipient.fingerprint()]);
    }

    #[test]
    fn truncated_nonce_is_integrity_error() {
        let (recipient, signer) = ed25519();
        let mut envelope = encrypt_to(b"pw", &[recipient], &[]).unwrap();
        envelope.nonce.pop();
        assert!(matches!(
            decrypt_with(&envelope, &[signer]),
            Err(PasshError::Integrity)
        ));
    }

    #[test]
    fn tampered_slot_is_integrity_not_auth() {
        let (recipient, signer) = ed25519();
        let mut envelope = encrypt_to(b"pw", &[recipient], &[]).unwrap();
        let last = envelope.slots[0].wrapped_key.len() - 1;
        envelope.slots[0].wrapped_key[last] ^= 0x01;
        assert!(matches!(
            decrypt_with(&envelope, &[signer]),
            Err(PasshError::Integrity)
        ));
    }

    #[test]
    fn file_signer_that_cannot_sign_fails_encryption() {
        use ssh_key::private::{KeypairData, RsaKeypair};

        let mut keypair = RsaKeypair::random(&mut OsRng, 2048).unwrap();
        keypair.private.q = keypair.private.p.clone();
        let key = PrivateKey::new(KeypairData::Rsa(keypair), "broken").unwrap();
        let recipient = Recipient::new(key.public_key().clone());
        let signer = Signer::File(FileSigner::new(key, Path::new("id_rsa")).unwrap());

        let result = encrypt_to(b"secret", &[recipient], &[signer]);
        assert!(matches!(result, Err(PasshError::KeyParse(_))));
    }

    #[test]
    fn unreachable_agent_only_loses_its_challenge_slot() {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let recipient = Recipient::new(key.public_key().clone());
        let dir = tempfile::TempDir::new().unwrap();
        let signer = Signer::Agent(AgentSigner::new(
            key.public_key().clone(),
            "gone".into(),
            &dir.path().join("agent.sock"),
        ));

        let envelope = encrypt_to(b"secret", &[recipient], &[signer]).unwrap();
        assert_eq!(envelope.slots.len(), 1);
        assert_eq!(envelope.slots[0].kind, SlotKind::X25519);
    }
}
