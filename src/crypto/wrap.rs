//! Wrapping and unwrapping of content keys, one slot at a time.
//!
//! Slot kinds:
//!
//! | kind            | recipient key | how the KEK is obtained                               |
//! |-----------------|---------------|-------------------------------------------------------|
//! | `rsa-oaep`      | RSA           | no KEK: content key is RSA-OAEP(SHA-256) encrypted    |
//! | `x25519`        | Ed25519       | ephemeral X25519 ECDH against the converted key, HKDF |
//! | `p256`          | ECDSA P-256   | ephemeral P-256 ECDH, HKDF                            |
//! | `sig-challenge` | Ed25519, RSA  | HKDF over the key's signature on a random challenge   |
//!
//! The first three only need the recipient's public key to create, and a
//! file-backed private key to open.  `sig-challenge` slots need a signer
//! at creation time but can be opened by anything that can sign with the
//! key, which is what makes agent-delegated decryption possible.
//!
//! Wrapped keys are sealed with AES-256-GCM; the slot's fingerprint and
//! kind are bound in as associated data.

use curve25519_dalek::edwards::CompressedEdwardsY;
use rand::rngs::OsRng;
use rand::RngCore;
use rsa::Oaep;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256, Sha512};
use ssh_key::private::KeypairData;
use ssh_key::public::{EcdsaPublicKey, KeyData};
use ssh_key::PublicKey;
use zeroize::Zeroizing;

use super::encryption::{self, Sealed};
use super::keys::{derive_kek, ContentKey, KEY_LEN};
use crate::errors::{PasshError, Result};
use crate::keyring::parse::rsa_private_key;
use crate::keyring::{fingerprint, Signer};

const X25519_INFO: &[u8] = b"passh/x25519";
const P256_INFO: &[u8] = b"passh/p256";
const CHALLENGE_INFO: &[u8] = b"passh/sig-challenge";

/// Prefix of every message a signer is asked to sign.
const CHALLENGE_DOMAIN: &[u8] = b"passh-challenge-v1";

/// Length of the random challenge in a `sig-challenge` slot.
pub const CHALLENGE_LEN: usize = 32;

/// How a slot's content key is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SlotKind {
    #[serde(rename = "rsa-oaep")]
    RsaOaep,
    #[serde(rename = "x25519")]
    X25519,
    #[serde(rename = "p256")]
    P256,
    #[serde(rename = "sig-challenge")]
    SigChallenge,
}

impl SlotKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::RsaOaep => "rsa-oaep",
            Self::X25519 => "x25519",
            Self::P256 => "p256",
            Self::SigChallenge => "sig-challenge",
        }
    }

    /// Whether `signer` has the capability this slot kind needs.
    pub fn openable_by(self, signer: &Signer) -> bool {
        match self {
            Self::SigChallenge => signer.signs_deterministically(),
            Self::RsaOaep | Self::X25519 | Self::P256 => signer.private_key().is_some(),
        }
    }
}

/// A content key wrapped for one recipient.
#[derive(Debug, Clone)]
pub struct Wrapped {
    pub kind: SlotKind,
    /// Public exchange value: ephemeral public key, challenge, or empty.
    pub share: Vec<u8>,
    pub wrapped_key: Vec<u8>,
}

/// Wrap `content_key` so only the holder of `recipient`'s private key can
/// recover it.
pub fn wrap_for_recipient(recipient: &PublicKey, content_key: &ContentKey) -> Result<Wrapped> {
    let fp = fingerprint(recipient);

    match recipient.key_data() {
        KeyData::Rsa(public) => {
            let public = rsa::RsaPublicKey::try_from(public)
                .map_err(|e| PasshError::KeyParse(format!("RSA public key: {e}")))?;
            let wrapped_key = public
                .encrypt(&mut OsRng, Oaep::new::<Sha256>(), content_key.as_bytes())
                .map_err(|e| PasshError::Encryption(format!("RSA-OAEP: {e}")))?;
            Ok(Wrapped {
                kind: SlotKind::RsaOaep,
                share: Vec::new(),
                wrapped_key,
            })
        }
        KeyData::Ed25519(public) => {
            let recipient_x = ed25519_to_x25519_public(&public.0)?;
            let ephemeral = x25519_dalek::EphemeralSecret::random_from_rng(OsRng);
            let ephemeral_public = x25519_dalek::PublicKey::from(&ephemeral);
            let shared = ephemeral.diffie_hellman(&recipient_x);
            if !shared.was_contributory() {
                return Err(PasshError::Encryption(
                    "recipient key is a low-order point".into(),
                ));
            }

            let salt = [&ephemeral_public.as_bytes()[..], &recipient_x.as_bytes()[..]].concat();
            let kek = derive_kek(shared.as_bytes(), &salt, X25519_INFO)?;
            seal(SlotKind::X25519, &fp, ephemeral_public.as_bytes().to_vec(), &kek, content_key)
        }
        KeyData::Ecdsa(public @ EcdsaPublicKey::NistP256(_)) => {
            let recipient_p = p256::PublicKey::from_sec1_bytes(public.as_sec1_bytes())
                .map_err(|e| PasshError::KeyParse(format!("P-256 public key: {e}")))?;
            let ephemeral = p256::ecdh::EphemeralSecret::random(&mut OsRng);
            let ephemeral_public = p256::EncodedPoint::from(ephemeral.public_key());
            let shared = ephemeral.diffie_hellman(&recipient_p);

            let salt = [ephemeral_public.as_bytes(), public.as_sec1_bytes()].concat();
            let kek = derive_kek(shared.raw_secret_bytes(), &salt, P256_INFO)?;
            seal(SlotKind::P256, &fp, ephemeral_public.as_bytes().to_vec(), &kek, content_key)
        }
        _ => Err(PasshError::UnsupportedKey(recipient.algorithm().as_str().to_string())),
    }
}

/// Wrap `content_key` under a KEK derived from `signer`'s signature over a
/// fresh random challenge.
pub fn wrap_with_challenge(signer: &Signer, content_key: &ContentKey) -> Result<Wrapped> {
    let mut challenge = [0u8; CHALLENGE_LEN];
    OsRng.fill_bytes(&mut challenge);

    let kek = challenge_kek(signer, &challenge)?;
    seal(
        SlotKind::SigChallenge,
        signer.fingerprint(),
        challenge.to_vec(),
        &kek,
        content_key,
    )
}

/// Recover the content key from one slot using `signer`.
///
/// The caller has already matched the slot's fingerprint against the
/// signer.  Any failure here on a matching slot means the slot is
/// corrupted, and is reported as `Integrity`.
pub fn unwrap(signer: &Signer, kind: SlotKind, share: &[u8], wrapped_key: &[u8]) -> Result<ContentKey> {
    let fp = signer.fingerprint();

    if kind == SlotKind::SigChallenge {
        if share.len() != CHALLENGE_LEN {
            return Err(PasshError::Integrity);
        }
        let kek = challenge_kek(signer, share)?;
        return open(kind, fp, &kek, wrapped_key);
    }

    let private = signer
        .private_key()
        .ok_or_else(|| PasshError::AgentUnavailable(format!("{} slots need the key file", kind.as_str())))?;

    match (kind, private.key_data()) {
        (SlotKind::RsaOaep, KeypairData::Rsa(keypair)) => {
            let private = rsa_private_key(keypair)?;
            let key = Zeroizing::new(
                private
                    .decrypt(Oaep::new::<Sha256>(), wrapped_key)
                    .map_err(|_| PasshError::Integrity)?,
            );
            ContentKey::from_slice(&key)
        }
        (SlotKind::X25519, KeypairData::Ed25519(keypair)) => {
            let ephemeral_public: [u8; 32] = share.try_into().map_err(|_| PasshError::Integrity)?;
            let ephemeral_public = x25519_dalek::PublicKey::from(ephemeral_public);

            let seed = Zeroizing::new(keypair.private.to_bytes());
            let secret = ed25519_to_x25519_secret(&seed);
            let recipient_x = x25519_dalek::PublicKey::from(&secret);
            let shared = secret.diffie_hellman(&ephemeral_public);
            if !shared.was_contributory() {
                return Err(PasshError::Integrity);
            }

            let salt = [&ephemeral_public.as_bytes()[..], &recipient_x.as_bytes()[..]].concat();
            let kek = derive_kek(shared.as_bytes(), &salt, X25519_INFO)?;
            open(kind, fp, &kek, wrapped_key)
        }
        (SlotKind::P256, KeypairData::Ecdsa(keypair)) => {
            let secret = p256::SecretKey::from_slice(keypair.private_key_bytes())
                .map_err(|e| PasshError::KeyParse(format!("P-256 private key: {e}")))?;
            let ephemeral_public =
                p256::PublicKey::from_sec1_bytes(share).map_err(|_| PasshError::Integrity)?;
            let shared = p256::ecdh::diffie_hellman(
                secret.to_nonzero_scalar(),
                ephemeral_public.as_affine(),
            );

            let salt = [share, keypair.public_key_bytes()].concat();
            let kek = derive_kek(shared.raw_secret_bytes(), &salt, P256_INFO)?;
            open(kind, fp, &kek, wrapped_key)
        }
        _ => Err(PasshError::UnsupportedKey(format!(
            "{} slot for {} key",
            kind.as_str(),
            private.algorithm().as_str()
        ))),
    }
}

fn challenge_kek(signer: &Signer, challenge: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let message = [CHALLENGE_DOMAIN, challenge].concat();
    let signature = signer.sign(&message)?;
    derive_kek(&signature, challenge, CHALLENGE_INFO)
}

fn slot_aad(kind: SlotKind, fingerprint: &str) -> Vec<u8> {
    [kind.as_str().as_bytes(), &b":"[..], fingerprint.as_bytes()].concat()
}

fn seal(
    kind: SlotKind,
    fingerprint: &str,
    share: Vec<u8>,
    kek: &[u8; KEY_LEN],
    content_key: &ContentKey,
) -> Result<Wrapped> {
    let sealed = encryption::encrypt(kek, content_key.as_bytes(), &slot_aad(kind, fingerprint))?;
    Ok(Wrapped {
        kind,
        share,
        wrapped_key: sealed.to_bytes(),
    })
}

fn open(kind: SlotKind, fingerprint: &str, kek: &[u8; KEY_LEN], wrapped_key: &[u8]) -> Result<ContentKey> {
    let sealed = Sealed::from_bytes(wrapped_key)?;
    let key = encryption::decrypt(kek, &sealed.nonce, &sealed.ciphertext, &slot_aad(kind, fingerprint))?;
    ContentKey::from_slice(&key)
}

/// Map an Ed25519 public key onto the X25519 curve (birational map).
fn ed25519_to_x25519_public(ed25519: &[u8; 32]) -> Result<x25519_dalek::PublicKey> {
    let point = CompressedEdwardsY(*ed25519)
        .decompress()
        .ok_or_else(|| PasshError::KeyParse("invalid Ed25519 public key".into()))?;
    Ok(x25519_dalek::PublicKey::from(point.to_montgomery().to_bytes()))
}

/// Derive the X25519 scalar matching an Ed25519 seed, the same way the
/// Ed25519 signing scalar is derived: the low half of SHA-512(seed).
fn ed25519_to_x25519_secret(seed: &[u8; 32]) -> x25519_dalek::StaticSecret {
    let digest = Sha512::digest(seed);
    let mut scalar = Zeroizing::new([0u8; 32]);
    scalar.copy_from_slice(&digest[..32]);
    x25519_dalek::StaticSecret::from(*scalar)
}
