//! Signers: the private-key side of the keyring.
//!
//! A `Signer` can report its public key and prove possession of the
//! matching private key.  The file-backed variant holds the parsed key in
//! memory for the duration of the invocation (ssh-key zeroes it on drop);
//! the agent-backed variant only ever holds the public key and a socket
//! path, and asks the agent for a signature when one is needed.

use std::path::{Path, PathBuf};

use rsa::pkcs1v15::SigningKey;
use sha2::Sha512;
use signature::{SignatureEncoding, Signer as _};
use ssh_key::private::KeypairData;
use ssh_key::public::KeyData;
use ssh_key::{PrivateKey, PublicKey};
use zeroize::Zeroizing;

use super::parse::{fingerprint, rsa_private_key};
use crate::errors::{PasshError, Result};

/// A private identity available for decryption.
pub enum Signer {
    File(FileSigner),
    Agent(AgentSigner),
}

impl Signer {
    pub fn public_key(&self) -> &PublicKey {
        match self {
            Self::File(s) => s.key.public_key(),
            Self::Agent(s) => &s.public,
        }
    }

    pub fn fingerprint(&self) -> &str {
        match self {
            Self::File(s) => &s.fingerprint,
            Self::Agent(s) => &s.fingerprint,
        }
    }

    /// Sign `message`, returning the raw signature bytes.
    pub fn sign(&self, message: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        match self {
            Self::File(s) => s.sign(message),
            Self::Agent(s) => s.sign(message),
        }
    }

    /// The in-memory private key, for key-transport unwrapping.
    ///
    /// Always `None` for agent signers.
    pub(crate) fn private_key(&self) -> Option<&PrivateKey> {
        match self {
            Self::File(s) => Some(&s.key),
            Self::Agent(_) => None,
        }
    }

    /// Whether signatures from this key are a pure function of key and
    /// message.  Only such keys can back a signature-challenge slot, since
    /// the KEK is derived from the signature bytes.
    pub fn signs_deterministically(&self) -> bool {
        matches!(
            self.public_key().key_data(),
            KeyData::Ed25519(_) | KeyData::Rsa(_)
        )
    }

    pub fn is_agent(&self) -> bool {
        matches!(self, Self::Agent(_))
    }

    /// Human-readable origin, for diagnostics.
    pub fn describe(&self) -> String {
        match self {
            Self::File(s) => format!("{} ({})", s.fingerprint, s.source.display()),
            Self::Agent(s) => format!("{} (agent: {})", s.fingerprint, s.comment),
        }
    }
}

/// A private key parsed from a file.
pub struct FileSigner {
    key: PrivateKey,
    fingerprint: String,
    source: PathBuf,
}

impl FileSigner {
    /// Wrap an already-decrypted private key.
    pub fn new(key: PrivateKey, source: &Path) -> Result<Self> {
        if key.is_encrypted() {
            return Err(PasshError::PassphraseRequired(source.to_path_buf()));
        }
        let fingerprint = fingerprint(key.public_key());
        Ok(Self {
            key,
            fingerprint,
            source: source.to_path_buf(),
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// RSA keys sign as `rsa-sha2-512`, matching what the agent is asked
    /// for, so file and agent signatures over a challenge agree.
    fn sign(&self, message: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        if let KeypairData::Rsa(keypair) = self.key.key_data() {
            let signing_key = SigningKey::<Sha512>::new(rsa_private_key(keypair)?);
            let signature = signing_key
                .try_sign(message)
                .map_err(|e| PasshError::Encryption(format!("RSA signing failed: {e}")))?;
            return Ok(Zeroizing::new(signature.to_vec()));
        }

        let signature: ssh_key::Signature = self
            .key
            .try_sign(message)
            .map_err(|e| PasshError::Encryption(format!("signing failed: {e}")))?;
        Ok(Zeroizing::new(signature.as_bytes().to_vec()))
    }
}

/// An identity held by a running agent.
pub struct AgentSigner {
    public: PublicKey,
    fingerprint: String,
    comment: String,
    socket: PathBuf,
}

impl AgentSigner {
    pub fn new(public: PublicKey, comment: String, socket: &Path) -> Self {
        let fingerprint = fingerprint(&public);
        Self {
            public,
            fingerprint,
            comment,
            socket: socket.to_path_buf(),
        }
    }

    #[cfg(unix)]
    fn sign(&self, message: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        let mut client = super::agent::AgentClient::connect(&self.socket)?;
        let signature = client.sign(&self.public, message)?;
        Ok(Zeroizing::new(signature))
    }

    #[cfg(not(unix))]
    fn sign(&self, _message: &[u8]) -> Result<Zeroizing<Vec<u8>>> {
        Err(PasshError::AgentUnavailable(format!(
            "agent delegation needs a Unix socket ({})",
            self.socket.display()
        )))
    }
}
