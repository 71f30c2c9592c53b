//! CLI module: clap argument parser, shared keyring bootstrap, output
//! helpers, and command implementations.

pub mod commands;
pub mod generator;
pub mod output;

use std::io::{self, IsTerminal, Read};
use std::path::{Path, PathBuf};

use clap::Parser;
use zeroize::Zeroizing;

use crate::config::{KeyConfig, Settings};
use crate::errors::{PasshError, Result};
use crate::keyring::KeyRing;
use crate::store::CredentialStore;

/// passh: a password manager backed by your SSH keys.
#[derive(Parser)]
#[command(
    name = "passh",
    about = "A password manager backed by your existing SSH keys",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Store directory (default: ~/.passh)
    #[arg(long, env = "PASSH_STORE", global = true)]
    pub store: Option<PathBuf>,

    /// Public key to encrypt to (default: first of ~/.ssh/id_{ed25519,ecdsa,rsa}.pub)
    #[arg(long, global = true)]
    pub public_key: Option<PathBuf>,

    /// Private key to decrypt with (default: first of ~/.ssh/id_{ed25519,ecdsa,rsa})
    #[arg(long, global = true)]
    pub private_key: Option<PathBuf>,

    /// Do not use ssh-agent
    #[arg(long, global = true)]
    pub no_agent: bool,
}

/// All available subcommands.
#[derive(clap::Subcommand)]
pub enum Commands {
    /// Add a password (prompts unless --generate)
    Add {
        /// Entry name (e.g. email/work)
        name: String,
        /// Generate a random password instead of prompting
        #[arg(short, long)]
        generate: bool,
        /// Length of the generated password
        #[arg(short, long)]
        length: Option<usize>,
    },

    /// Print a password
    Get {
        /// Entry name
        name: String,
    },

    /// List all entries
    List,

    /// Delete a password
    Delete {
        /// Entry name
        name: String,
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Generate, store and print a random password
    Generate {
        /// Entry name
        name: String,
        /// Password length
        #[arg(short, long)]
        length: Option<usize>,
        /// Letters and digits only
        #[arg(short = 'n', long)]
        no_symbols: bool,
    },

    /// Check SSH keys, agent and store directory
    Setup,

    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

// ---------------------------------------------------------------------------
// Shared helpers used by multiple commands
// ---------------------------------------------------------------------------

/// Load `Settings` from `$PASSH_CONFIG` or the platform config directory.
pub fn load_settings() -> Result<Settings> {
    Settings::load_default()
}

/// The store root: `--store` / `$PASSH_STORE`, else the settings.
pub fn store_dir(cli: &Cli, settings: &Settings) -> PathBuf {
    cli.store.clone().unwrap_or_else(|| settings.store_dir())
}

/// Open the store for writing, creating the root if needed.
pub fn open_store(cli: &Cli, settings: &Settings) -> Result<CredentialStore> {
    CredentialStore::open(&store_dir(cli, settings))
}

/// Handle to the store for reading; a missing root is an empty store.
pub fn existing_store(cli: &Cli, settings: &Settings) -> CredentialStore {
    CredentialStore::at(&store_dir(cli, settings))
}

/// Resolve which key files and agent this invocation uses.
pub fn key_config(cli: &Cli, settings: &Settings) -> KeyConfig {
    KeyConfig::resolve(
        settings,
        cli.public_key.as_deref(),
        cli.private_key.as_deref(),
        cli.no_agent,
    )
}

/// Build a keyring for writing entries.
///
/// The public key is required.  Signers are loaded opportunistically
/// (agent identities, an unprotected private key) so that entries also
/// get signature-challenge slots; nothing here prompts.
pub fn keyring_for_encryption(config: &KeyConfig) -> Result<KeyRing> {
    let mut ring = KeyRing::new(config);

    let public_key = config.public_key.as_deref().ok_or_else(|| {
        PasshError::Config(
            "no SSH public key found; pass --public-key or run `passh setup`".into(),
        )
    })?;
    ring.add_recipient_file(public_key)?;

    match config.private_key.as_deref() {
        Some(path) => match ring.add_signer(path, None) {
            Ok(()) => {}
            Err(PasshError::PassphraseRequired(_)) => {
                tracing::debug!("private key is protected, not loading it for encryption");
            }
            Err(e) => tracing::debug!("private key not loaded for encryption: {e}"),
        },
        None => {
            if let Err(e) = ring.add_agent_signers() {
                tracing::debug!("{e}");
            }
        }
    }

    Ok(ring)
}

/// Build a keyring for reading entries.
///
/// A passphrase-protected private key is prompted for exactly once; a
/// wrong passphrase is fatal.
pub fn keyring_for_decryption(config: &KeyConfig) -> Result<KeyRing> {
    let mut ring = KeyRing::new(config);

    match config.private_key.as_deref() {
        Some(path) => match ring.add_signer(path, None) {
            Err(PasshError::PassphraseRequired(path)) => {
                let passphrase = prompt_passphrase(&path)?;
                ring.add_file_signer(&path, Some(passphrase.as_bytes()))?;
            }
            other => other?,
        },
        None => {
            if let Err(e) = ring.add_agent_signers() {
                tracing::debug!("{e}");
            }
        }
    }

    if ring.signers().is_empty() {
        return Err(PasshError::Config(
            "no SSH private key or agent identity available; pass --private-key or run `passh setup`"
                .into(),
        ));
    }
    Ok(ring)
}

/// Prompt for a key passphrase.
pub fn prompt_passphrase(path: &Path) -> Result<Zeroizing<String>> {
    let passphrase = dialoguer::Password::new()
        .with_prompt(format!("Enter passphrase for {}", path.display()))
        .allow_empty_password(true)
        .interact()
        .map_err(|e| PasshError::CommandFailed(format!("passphrase prompt: {e}")))?;
    Ok(Zeroizing::new(passphrase))
}

/// Read the secret to store under `name`.
///
/// Piped stdin is taken verbatim (one trailing newline stripped).  On a
/// terminal the secret is prompted for twice; a mismatch is an error.
pub fn prompt_secret(name: &str) -> Result<Zeroizing<String>> {
    if !io::stdin().is_terminal() {
        let mut buf = Zeroizing::new(String::new());
        io::stdin().read_to_string(&mut buf)?;
        let text: &str = &buf;
        let trimmed = text.strip_suffix('\n').unwrap_or(text);
        let trimmed = trimmed.strip_suffix('\r').unwrap_or(trimmed);
        return Ok(Zeroizing::new(trimmed.to_string()));
    }

    let secret = Zeroizing::new(
        dialoguer::Password::new()
            .with_prompt(format!("Enter password for '{name}'"))
            .interact()
            .map_err(|e| PasshError::CommandFailed(format!("password prompt: {e}")))?,
    );
    let confirm = Zeroizing::new(
        dialoguer::Password::new()
            .with_prompt("Confirm password")
            .interact()
            .map_err(|e| PasshError::CommandFailed(format!("password prompt: {e}")))?,
    );

    if *secret != *confirm {
        return Err(PasshError::PasswordMismatch);
    }
    Ok(secret)
}

/// The length to generate: explicit flag, else the configured default.
pub fn generate_length(requested: Option<usize>, settings: &Settings) -> usize {
    requested.unwrap_or(settings.generate_length)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "passh",
            "get",
            "email/work",
            "--store",
            "/tmp/s",
            "--no-agent",
        ])
        .unwrap();
        assert_eq!(cli.store, Some(PathBuf::from("/tmp/s")));
        assert!(cli.no_agent);
        assert!(matches!(cli.command, Commands::Get { ref name } if name == "email/work"));
    }

    #[test]
    fn generate_flags() {
        let cli = Cli::try_parse_from(["passh", "generate", "x", "-l", "24", "-n"]).unwrap();
        match cli.command {
            Commands::Generate {
                length, no_symbols, ..
            } => {
                assert_eq!(length, Some(24));
                assert!(no_symbols);
            }
            _ => panic!("expected generate"),
        }
    }

    #[test]
    fn encryption_keyring_needs_a_public_key() {
        let config = KeyConfig::default();
        assert!(matches!(
            keyring_for_encryption(&config),
            Err(PasshError::Config(_))
        ));
    }

    #[test]
    fn generate_length_falls_back_to_settings() {
        let settings = Settings::default();
        assert_eq!(generate_length(None, &settings), 16);
        assert_eq!(generate_length(Some(40), &settings), 40);
    }
}
