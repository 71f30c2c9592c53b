use std::path::PathBuf;
use thiserror::Error;

/// All errors that can occur in passh.
#[derive(Debug, Error)]
pub enum PasshError {
    // --- Key parsing errors ---
    #[error("Failed to parse key: {0}")]
    KeyParse(String),

    #[error("Unsupported key type: {0}")]
    UnsupportedKey(String),

    // --- Authentication errors ---
    #[error("Private key {0} is passphrase protected")]
    PassphraseRequired(PathBuf),

    #[error("Wrong passphrase for private key {0}")]
    WrongPassphrase(PathBuf),

    #[error("No available key can decrypt this entry")]
    NoMatchingKey,

    // --- Crypto errors ---
    #[error("Integrity check failed: entry is corrupted or has been tampered with")]
    Integrity,

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("No public keys available for encryption")]
    NoRecipients,

    // --- Store errors ---
    #[error("Entry '{0}' not found")]
    EntryNotFound(String),

    #[error("Invalid entry name: {0}")]
    InvalidName(String),

    #[error("Invalid entry format: {0}")]
    InvalidFormat(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    // --- Agent errors ---
    #[error("SSH agent not available: {0}")]
    AgentUnavailable(String),

    // --- IO errors ---
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // --- Config errors ---
    #[error("Config error: {0}")]
    Config(String),

    // --- CLI errors ---
    #[error("Command failed: {0}")]
    CommandFailed(String),

    #[error("User cancelled operation")]
    UserCancelled,

    #[error("Passwords do not match")]
    PasswordMismatch,
}

impl PasshError {
    /// Returns `true` for the authentication class of failures: a missing
    /// or wrong passphrase, or no loaded key matching an entry.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::PassphraseRequired(_) | Self::WrongPassphrase(_) | Self::NoMatchingKey
        )
    }
}

/// Convenience type alias for passh results.
pub type Result<T> = std::result::Result<T, PasshError>;
