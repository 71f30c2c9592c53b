//! The keyring: recipients for encryption and signers for decryption.
//!
//! Recipients are SSH public keys; every envelope gets one slot per
//! recipient.  Signers are private identities, either parsed from a key
//! file or delegated to a running `ssh-agent`.  When the agent holds the
//! same identity as a key file, the agent signer is preferred so that the
//! raw private key never has to be decrypted into this process.
//!
//! A keyring is built once per invocation and dropped at exit.

#[cfg(unix)]
pub mod agent;
pub mod parse;
pub mod signer;

use std::fs;
use std::path::{Path, PathBuf};

use ssh_key::PublicKey;

use crate::config::KeyConfig;
use crate::errors::{PasshError, Result};

pub use parse::{fingerprint, parse_private_key, parse_public_key};
pub use signer::{AgentSigner, FileSigner, Signer};

/// A public key that entries are encrypted to.
#[derive(Debug, Clone)]
pub struct Recipient {
    key: PublicKey,
    fingerprint: String,
}

impl Recipient {
    pub fn new(key: PublicKey) -> Self {
        let fingerprint = fingerprint(&key);
        Self { key, fingerprint }
    }

    pub fn key(&self) -> &PublicKey {
        &self.key
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    /// Key type tag, e.g. `ssh-ed25519` or `rsa-sha2-512`.
    pub fn key_type(&self) -> String {
        self.key.algorithm().as_str().to_string()
    }
}

/// The set of keys available to one invocation.
pub struct KeyRing {
    recipients: Vec<Recipient>,
    signers: Vec<Signer>,
    use_agent: bool,
    agent_socket: Option<PathBuf>,
    /// Agent identities, fetched at most once.
    agent_checked: bool,
    /// Encrypted key files skipped because the agent covers the same key.
    deferred: Vec<PathBuf>,
}

impl KeyRing {
    /// Create an empty keyring.  Agent use follows `config`.
    pub fn new(config: &KeyConfig) -> Self {
        Self {
            recipients: Vec::new(),
            signers: Vec::new(),
            use_agent: config.use_agent,
            agent_socket: config.agent_socket.clone(),
            agent_checked: false,
            deferred: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Recipients
    // ------------------------------------------------------------------

    /// Parse a public key and add it as a recipient.
    ///
    /// Keys already present (same fingerprint) are ignored.
    pub fn add_recipient(&mut self, public_key_bytes: &[u8]) -> Result<&Recipient> {
        let key = parse_public_key(public_key_bytes)?;
        let recipient = Recipient::new(key);

        let index = match self
            .recipients
            .iter()
            .position(|r| r.fingerprint == recipient.fingerprint)
        {
            Some(existing) => existing,
            None => {
                tracing::debug!(
                    fingerprint = %recipient.fingerprint,
                    key_type = %recipient.key_type(),
                    "added recipient"
                );
                self.recipients.push(recipient);
                self.recipients.len() - 1
            }
        };
        Ok(&self.recipients[index])
    }

    /// Read a `.pub` file and add it as a recipient.
    pub fn add_recipient_file(&mut self, path: &Path) -> Result<&Recipient> {
        let data = fs::read(path).map_err(|e| {
            PasshError::KeyParse(format!("cannot read public key {}: {e}", path.display()))
        })?;
        self.add_recipient(&data)
    }

    // ------------------------------------------------------------------
    // Signers
    // ------------------------------------------------------------------

    /// Add the private identity stored at `path`.
    ///
    /// Agent identities are enumerated first (when enabled) and added as
    /// signers.  If the agent already holds the key in `path` and the file
    /// is passphrase protected, the file is left alone and recorded as
    /// deferred; see [`KeyRing::deferred_keys`].
    ///
    /// A protected key without a `passphrase` fails with
    /// `PassphraseRequired` so the caller can prompt and retry.
    pub fn add_signer(&mut self, path: &Path, passphrase: Option<&[u8]>) -> Result<()> {
        if let Err(e) = self.add_agent_signers() {
            tracing::debug!("{e}; using key files only");
        }

        if !path.exists() && self.signers.iter().any(Signer::is_agent) {
            tracing::debug!(path = %path.display(), "private key file missing, relying on agent");
            return Ok(());
        }

        let data = fs::read(path)?;
        let key = parse_private_key(&data)?;
        let fp = fingerprint(key.public_key());

        if key.is_encrypted() && self.has_signer(&fp) {
            if !self.has_file_signer(&fp) {
                tracing::debug!(fingerprint = %fp, "agent holds this key, deferring file");
                self.deferred.push(path.to_path_buf());
            }
            return Ok(());
        }

        self.push_file_signer(key, path, passphrase)
    }

    /// Add the private key at `path` without consulting the agent.
    pub fn add_file_signer(&mut self, path: &Path, passphrase: Option<&[u8]>) -> Result<()> {
        let data = fs::read(path)?;
        let key = parse_private_key(&data)?;
        self.push_file_signer(key, path, passphrase)
    }

    fn push_file_signer(
        &mut self,
        key: ssh_key::PrivateKey,
        path: &Path,
        passphrase: Option<&[u8]>,
    ) -> Result<()> {
        let key = if key.is_encrypted() {
            match passphrase {
                None => return Err(PasshError::PassphraseRequired(path.to_path_buf())),
                Some(p) => key
                    .decrypt(p)
                    .map_err(|_| PasshError::WrongPassphrase(path.to_path_buf()))?,
            }
        } else {
            key
        };

        let signer = FileSigner::new(key, path)?;
        if self.has_file_signer(signer.fingerprint()) {
            return Ok(());
        }

        let signer = Signer::File(signer);
        tracing::debug!(signer = %signer.describe(), "added file signer");
        self.deferred.retain(|p| p != path);
        self.signers.push(signer);
        Ok(())
    }

    /// Enumerate agent identities and add them as signers.
    ///
    /// Returns the number of identities the agent offered.  Any failure
    /// (agent disabled, no socket, connection refused) is
    /// `AgentUnavailable`, which callers treat as non-fatal.
    pub fn add_agent_signers(&mut self) -> Result<usize> {
        if !self.use_agent {
            return Err(PasshError::AgentUnavailable("disabled".into()));
        }
        let Some(socket) = self.agent_socket.clone() else {
            return Err(PasshError::AgentUnavailable(
                "SSH_AUTH_SOCK environment variable not set".into(),
            ));
        };
        if self.agent_checked {
            return Ok(self.signers.iter().filter(|s| s.is_agent()).count());
        }
        self.agent_checked = true;

        let identities = list_agent_identities(&socket)?;
        let count = identities.len();
        for (key, comment) in identities {
            let signer = AgentSigner::new(key, comment, &socket);
            let signer = Signer::Agent(signer);
            if !self.has_signer(signer.fingerprint()) {
                tracing::debug!(signer = %signer.describe(), "added agent signer");
                self.signers.push(signer);
            }
        }
        Ok(count)
    }

    fn has_signer(&self, fp: &str) -> bool {
        self.signers.iter().any(|s| s.fingerprint() == fp)
    }

    fn has_file_signer(&self, fp: &str) -> bool {
        self.signers
            .iter()
            .any(|s| !s.is_agent() && s.fingerprint() == fp)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn recipients(&self) -> &[Recipient] {
        &self.recipients
    }

    pub fn signers(&self) -> &[Signer] {
        &self.signers
    }

    /// Passphrase-protected key files that were skipped in favour of the
    /// agent.  Entries written before the agent held the key may need one
    /// of these loaded with [`KeyRing::add_file_signer`].
    pub fn deferred_keys(&self) -> &[PathBuf] {
        &self.deferred
    }
}

#[cfg(unix)]
fn list_agent_identities(socket: &Path) -> Result<Vec<(PublicKey, String)>> {
    let mut client = agent::AgentClient::connect(socket)?;
    let identities = client.list_identities()?;
    Ok(identities.into_iter().map(|i| (i.key, i.comment)).collect())
}

#[cfg(not(unix))]
fn list_agent_identities(socket: &Path) -> Result<Vec<(PublicKey, String)>> {
    Err(PasshError::AgentUnavailable(format!(
        "agent delegation needs a Unix socket ({})",
        socket.display()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::OsRng;
    use ssh_key::{Algorithm, LineEnding, PrivateKey};
    use tempfile::TempDir;

    fn no_agent() -> KeyConfig {
        KeyConfig {
            use_agent: false,
            ..KeyConfig::default()
        }
    }

    #[test]
    fn recipients_are_deduplicated_by_fingerprint() {
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let line = key.public_key().to_openssh().unwrap();

        let mut ring = KeyRing::new(&no_agent());
        ring.add_recipient(line.as_bytes()).unwrap();
        ring.add_recipient(format!("{line} other-comment").as_bytes())
            .unwrap();
        assert_eq!(ring.recipients().len(), 1);
        assert_eq!(ring.recipients()[0].key_type(), "ssh-ed25519");
    }

    #[test]
    fn malformed_recipient_is_parse_error() {
        let mut ring = KeyRing::new(&no_agent());
        let result = ring.add_recipient(b"definitely not a key");
        assert!(matches!(result, Err(PasshError::KeyParse(_))));
        assert!(ring.recipients().is_empty());
    }

    #[test]
    fn disabled_agent_reports_unavailable() {
        let mut ring = KeyRing::new(&no_agent());
        assert!(matches!(
            ring.add_agent_signers(),
            Err(PasshError::AgentUnavailable(_))
        ));
    }

    #[test]
    fn unreachable_agent_downgrades_to_file_signer() {
        let dir = TempDir::new().unwrap();
        let key = PrivateKey::random(&mut OsRng, Algorithm::Ed25519).unwrap();
        let path = dir.path().join("id_ed25519");
        fs::write(&path, key.to_openssh(LineEnding::LF).unwrap().as_bytes()).unwrap();

        let config = KeyConfig {
            use_agent: true,
            agent_socket: Some(dir.path().join("missing.sock")),
            ..KeyConfig::default()
        };
        let mut ring = KeyRing::new(&config);
        ring.add_signer(&path, None).unwrap();

        assert_eq!(ring.signers().len(), 1);
        assert!(!ring.signers()[0].is_agent());
    }
}
