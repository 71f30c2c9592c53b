//! Key material helpers: the one-time content key and HKDF-SHA256
//! derivation of key-encryption keys (KEKs).
//!
//! Every slot in an envelope protects the content key under a KEK that is
//! derived from some secret only the recipient can reproduce (an ECDH
//! shared secret, or a signature over a random challenge).  HKDF (RFC 5869)
//! turns that secret into a uniform 32-byte AES key, with the `info` string
//! separating the different slot kinds.

use hkdf::Hkdf;
use rand::RngCore;
use sha2::Sha256;
use zeroize::{Zeroize, Zeroizing};

use crate::errors::{PasshError, Result};

/// Length of content keys and KEKs (256 bits, for AES-256).
pub const KEY_LEN: usize = 32;

/// Derive a KEK from a shared secret.
///
/// `salt` binds the derivation to the public values of the exchange
/// (ephemeral and recipient keys, or the challenge).
pub fn derive_kek(shared: &[u8], salt: &[u8], info: &[u8]) -> Result<Zeroizing<[u8; KEY_LEN]>> {
    let hk = Hkdf::<Sha256>::new(Some(salt), shared);

    let mut okm = Zeroizing::new([0u8; KEY_LEN]);
    hk.expand(info, okm.as_mut())
        .map_err(|e| PasshError::Encryption(format!("HKDF expand failed: {e}")))?;

    Ok(okm)
}

/// A one-time symmetric key protecting a single secret.
///
/// Zeroed when dropped, on every exit path.
#[derive(Zeroize)]
#[zeroize(drop)]
pub struct ContentKey {
    bytes: [u8; KEY_LEN],
}

impl ContentKey {
    /// Draw a fresh key from the OS RNG.
    pub fn generate() -> Self {
        let mut bytes = [0u8; KEY_LEN];
        rand::rngs::OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Rebuild a key recovered from a slot.  Fails unless exactly 32 bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEY_LEN {
            return Err(PasshError::Integrity);
        }
        let mut key = [0u8; KEY_LEN];
        key.copy_from_slice(bytes);
        Ok(Self { bytes: key })
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.bytes
    }
}
