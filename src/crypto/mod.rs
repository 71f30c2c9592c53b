//! Cryptographic building blocks for passh.
//!
//! - `encryption`: AES-256-GCM sealing of secrets and wrapped keys
//! - `keys`: the one-time content key and HKDF derivation of KEKs
//! - `wrap`: per key-type wrapping of the content key into a slot
//! - `envelope`: the multi-recipient envelope and `EnvelopeCipher`

pub mod encryption;
pub mod envelope;
pub mod keys;
pub mod wrap;

pub use envelope::{decrypt_with, encrypt_to, Envelope, EnvelopeCipher, Slot};
pub use keys::ContentKey;
pub use wrap::SlotKind;
