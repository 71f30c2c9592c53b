//! AES-256-GCM authenticated encryption.
//!
//! Each call to `encrypt` generates a fresh random 12-byte nonce.  The
//! envelope keeps nonce and ciphertext in separate fields; wrapped content
//! keys use the packed form produced by `Sealed::to_bytes`:
//!   [ 12-byte nonce | ciphertext + 16-byte auth tag ]

use aes_gcm::aead::{Aead, KeyInit, OsRng, Payload};
use aes_gcm::{AeadCore, Aes256Gcm, Nonce};
use zeroize::Zeroizing;

use crate::errors::{PasshError, Result};

/// Size of the AES-256-GCM nonce in bytes.
pub const NONCE_LEN: usize = 12;

/// Size of the AES-256-GCM authentication tag in bytes.
pub const TAG_LEN: usize = 16;

/// Output of one `encrypt` call.
#[derive(Debug, Clone)]
pub struct Sealed {
    pub nonce: [u8; NONCE_LEN],
    /// Ciphertext with the 16-byte tag appended.
    pub ciphertext: Vec<u8>,
}

impl Sealed {
    /// Pack as `nonce || ciphertext` so the caller only needs to store one blob.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut output = Vec::with_capacity(NONCE_LEN + self.ciphertext.len());
        output.extend_from_slice(&self.nonce);
        output.extend_from_slice(&self.ciphertext);
        output
    }

    /// Split a packed blob back into nonce and ciphertext.
    pub fn from_bytes(packed: &[u8]) -> Result<Self> {
        if packed.len() < NONCE_LEN + TAG_LEN {
            return Err(PasshError::Integrity);
        }
        let (nonce_bytes, ciphertext) = packed.split_at(NONCE_LEN);
        let mut nonce = [0u8; NONCE_LEN];
        nonce.copy_from_slice(nonce_bytes);
        Ok(Self {
            nonce,
            ciphertext: ciphertext.to_vec(),
        })
    }
}

/// Encrypt `plaintext` with a 32-byte `key`, binding `aad` into the tag.
pub fn encrypt(key: &[u8], plaintext: &[u8], aad: &[u8]) -> Result<Sealed> {
    let cipher = Aes256Gcm::new_from_slice(key)
        .map_err(|e| PasshError::Encryption(format!("invalid key length: {e}")))?;

    let nonce = Aes256Gcm::generate_nonce(&mut OsRng);

    let ciphertext = cipher
        .encrypt(
            &nonce,
            Payload {
                msg: plaintext,
                aad,
            },
        )
        .map_err(|e| PasshError::Encryption(format!("encryption error: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_LEN];
    nonce_bytes.copy_from_slice(&nonce);
    Ok(Sealed {
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt and verify data produced by `encrypt`.
///
/// Any tag mismatch (wrong key, flipped bit, different `aad`) is reported
/// as `Integrity`; no partial plaintext is ever returned.
pub fn decrypt(key: &[u8], nonce: &[u8], ciphertext: &[u8], aad: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
    if nonce.len() != NONCE_LEN || ciphertext.len() < TAG_LEN {
        return Err(PasshError::Integrity);
    }

    let cipher = Aes256Gcm::new_from_slice(key).map_err(|_| PasshError::Integrity)?;

    let plaintext = cipher
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad,
            },
        )
        .map_err(|_| PasshError::Integrity)?;

    Ok(Zeroizing::new(plaintext))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip_with_aad() {
        let key = [0x42u8; 32];
        let sealed = encrypt(&key, b"hunter2", b"ctx").unwrap();
        let plain = decrypt(&key, &sealed.nonce, &sealed.ciphertext, b"ctx").unwrap();
        assert_eq!(plain.as_slice(), b"hunter2");
    }

    #[test]
    fn wrong_aad_is_integrity_failure() {
        let key = [0x42u8; 32];
        let sealed = encrypt(&key, b"hunter2", b"ctx").unwrap();
        let result = decrypt(&key, &sealed.nonce, &sealed.ciphertext, b"other");
        assert!(matches!(result, Err(PasshError::Integrity)));
    }

    #[test]
    fn packed_form_roundtrips() {
        let key = [0x07u8; 32];
        let sealed = encrypt(&key, b"k", b"").unwrap();
        let unpacked = Sealed::from_bytes(&sealed.to_bytes()).unwrap();
        assert_eq!(unpacked.nonce, sealed.nonce);
        assert_eq!(unpacked.ciphertext, sealed.ciphertext);
    }

    #[test]
    fn short_packed_blob_is_rejected() {
        assert!(matches!(
            Sealed::from_bytes(&[0u8; NONCE_LEN]),
            Err(PasshError::Integrity)
        ));
    }
}
